//! Treatment-variant generation for the correspondence study.
//!
//! Each control resume yields four stored variants: a rephrased control and
//! three treated versions carrying injected Canadian credentials and/or work
//! experience. An embedding-similarity gate keeps rephrasings close to the
//! source text.

pub mod generator;
pub mod models;
pub mod prompts;
pub mod similarity;
