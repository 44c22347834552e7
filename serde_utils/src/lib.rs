pub mod string_or_native;
