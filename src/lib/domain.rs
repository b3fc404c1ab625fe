//! Domain logic

pub mod mailing;
