pub mod checkpoint;
pub mod inspect;
pub mod status;
