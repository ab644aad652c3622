//! Wire format conversion

pub mod openai;
