pub mod cidr;
pub mod range;
pub mod target;
