// src/models/mod.rs

pub mod exam_result;
pub mod item_parameter;
pub mod question;
pub mod student;
pub mod subtest;
