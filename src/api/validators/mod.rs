pub mod customer;
pub mod field;

pub use customer::CustomerValidator;
pub use field::FieldValidator;
