pub mod array;
pub mod numeric;
pub mod value;
