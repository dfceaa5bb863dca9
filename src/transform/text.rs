//! Simple text clean-up transforms.

use super::{Transform, TransformOutcome};
use crate::error::TransformError;
use crate::record::{FieldRef, Record};

/// Joins the read fields, in order, with a delimiter.
pub struct Concat {
    delimiter: String,
    reads: Vec<FieldRef>,
    write: [FieldRef; 1],
}

impl Concat {
    #[must_use]
    pub fn new(delimiter: impl Into<String>, reads: Vec<FieldRef>, write: FieldRef) -> Self {
        Self {
            delimiter: delimiter.into(),
            reads,
            write: [write],
        }
    }
}

impl Transform for Concat {
    fn name(&self) -> &str {
        "concat"
    }

    fn reads(&self) -> &[FieldRef] {
        &self.reads
    }

    fn writes(&self) -> &[FieldRef] {
        &self.write
    }

    fn apply(&self, record: &mut Record) -> Result<TransformOutcome, TransformError> {
        let joined = self
            .reads
            .iter()
            .map(|f| record.get(*f))
            .collect::<Vec<_>>()
            .join(&self.delimiter);
        record.set(self.write[0], joined);
        Ok(TransformOutcome::Ok)
    }
}

macro_rules! string_transform {
    ($(#[$doc:meta])* $ty:ident, $name:literal, $f:expr) => {
        $(#[$doc])*
        pub struct $ty {
            read: [FieldRef; 1],
            write: [FieldRef; 1],
        }

        impl $ty {
            #[must_use]
            pub fn new(read: FieldRef, write: FieldRef) -> Self {
                Self {
                    read: [read],
                    write: [write],
                }
            }
        }

        impl Transform for $ty {
            fn name(&self) -> &str {
                $name
            }

            fn reads(&self) -> &[FieldRef] {
                &self.read
            }

            fn writes(&self) -> &[FieldRef] {
                &self.write
            }

            fn apply(&self, record: &mut Record) -> Result<TransformOutcome, TransformError> {
                let f: fn(&str) -> String = $f;
                let value = f(record.get(self.read[0]));
                record.set(self.write[0], value);
                Ok(TransformOutcome::Ok)
            }
        }
    };
}

string_transform!(
    /// Lowercases a field.
    Lowercase,
    "lowercase",
    str::to_lowercase
);
string_transform!(
    /// Uppercases a field.
    Uppercase,
    "uppercase",
    str::to_uppercase
);
string_transform!(
    /// Strips leading and trailing whitespace.
    Trim,
    "trim",
    |s| s.trim().to_string()
);
