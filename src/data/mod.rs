pub mod serializer;
pub mod value;
