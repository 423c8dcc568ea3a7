pub mod single_or_multiple;
