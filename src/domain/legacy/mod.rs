//! Legacy module - classification of pre-redesign products.

mod classification;

pub use classification::{
    classify, Classification, ClassificationError, ModernProduct, Selection,
};
