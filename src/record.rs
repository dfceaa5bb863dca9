//! Records, field references and per-job record layouts.
//!
//! A [`Record`] holds a job's fields in three fixed-size areas:
//! - [`Area::Input`] - the raw fields as they arrived
//! - [`Area::Scratch`] - intermediate values produced by one transform and read by another
//! - [`Area::Output`] - the fields forwarded to the worker process
//!
//! Transforms address fields by [`FieldRef`] (`area` + `index`) rather than by name.
//! Names are resolved once, when the job is configured, through a [`RecordLayout`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One of the three field areas of a [`Record`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Area {
    Input,
    Scratch,
    Output,
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Area::Input => "input",
            Area::Scratch => "scratch",
            Area::Output => "output",
        })
    }
}

/// Location of a single field within a [`Record`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    pub area: Area,
    pub index: usize,
}

impl FieldRef {
    #[must_use]
    pub const fn new(area: Area, index: usize) -> Self {
        Self { area, index }
    }

    #[must_use]
    pub const fn input(index: usize) -> Self {
        Self::new(Area::Input, index)
    }

    #[must_use]
    pub const fn scratch(index: usize) -> Self {
        Self::new(Area::Scratch, index)
    }

    #[must_use]
    pub const fn output(index: usize) -> Self {
        Self::new(Area::Output, index)
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.area, self.index)
    }
}

/// Per-job shape of a [`Record`] plus the name lookup used while building
/// transform chains.
///
/// Input names map to the input area in the order given. Output names map to
/// the output area. Any other field written by a transform is given a scratch
/// slot via [`RecordLayout::allocate_scratch`].
#[derive(Clone, Debug, Default)]
pub struct RecordLayout {
    input: Vec<String>,
    output: Vec<String>,
    scratch: Vec<String>,
}

impl RecordLayout {
    /// Build a layout from the job's input and output field names.
    #[must_use]
    pub fn new<I, O, S1, S2>(input: I, output: O) -> Self
    where
        I: IntoIterator<Item = S1>,
        O: IntoIterator<Item = S2>,
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            input: input.into_iter().map(Into::into).collect(),
            output: output.into_iter().map(Into::into).collect(),
            scratch: Vec::new(),
        }
    }

    /// Number of slots in `area`.
    #[must_use]
    pub fn size(&self, area: Area) -> usize {
        match area {
            Area::Input => self.input.len(),
            Area::Scratch => self.scratch.len(),
            Area::Output => self.output.len(),
        }
    }

    /// Names of the fields in `area`, in slot order.
    #[must_use]
    pub fn names(&self, area: Area) -> &[String] {
        match area {
            Area::Input => &self.input,
            Area::Scratch => &self.scratch,
            Area::Output => &self.output,
        }
    }

    /// Where a transform should read `name` from.
    ///
    /// Scratch values shadow inputs because they are the more recent
    /// derivation; an output that is also an input is read from the input area.
    #[must_use]
    pub fn read_ref(&self, name: &str) -> Option<FieldRef> {
        position(&self.scratch, name)
            .map(FieldRef::scratch)
            .or_else(|| position(&self.input, name).map(FieldRef::input))
            .or_else(|| position(&self.output, name).map(FieldRef::output))
    }

    /// Where a transform should write `name` to, allocating a scratch slot for
    /// names that are not job outputs.
    pub fn write_ref(&mut self, name: &str) -> FieldRef {
        match position(&self.output, name) {
            Some(i) => FieldRef::output(i),
            None => self.allocate_scratch(name),
        }
    }

    /// Return the scratch slot for `name`, creating it if needed.
    pub fn allocate_scratch(&mut self, name: &str) -> FieldRef {
        if let Some(i) = position(&self.scratch, name) {
            return FieldRef::scratch(i);
        }
        self.scratch.push(name.to_string());
        FieldRef::scratch(self.scratch.len() - 1)
    }

    /// Input fields that are also job outputs, as `(input, output)` pairs.
    #[must_use]
    pub fn passthrough(&self) -> Vec<(FieldRef, FieldRef)> {
        self.output
            .iter()
            .enumerate()
            .filter_map(|(o, name)| {
                position(&self.input, name).map(|i| (FieldRef::input(i), FieldRef::output(o)))
            })
            .collect()
    }

    /// Check that `field` lies within this layout.
    ///
    /// # Errors
    /// Returns [`ConfigError::FieldOutOfBounds`] if the index is past the end
    /// of its area.
    pub fn check(&self, field: FieldRef) -> Result<(), ConfigError> {
        let size = self.size(field.area);
        if field.index < size {
            Ok(())
        } else {
            Err(ConfigError::FieldOutOfBounds { field, size })
        }
    }
}

fn position(names: &[String], name: &str) -> Option<usize> {
    names.iter().position(|n| n == name)
}

/// A single record moving through the pipeline.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
    input: Vec<String>,
    scratch: Vec<String>,
    output: Vec<String>,
}

impl Record {
    /// An empty record shaped by `layout`.
    #[must_use]
    pub fn new(layout: &RecordLayout) -> Self {
        Self::with_sizes(
            layout.size(Area::Input),
            layout.size(Area::Scratch),
            layout.size(Area::Output),
        )
    }

    /// An empty record with explicit area sizes.
    #[must_use]
    pub fn with_sizes(input: usize, scratch: usize, output: usize) -> Self {
        Self {
            input: vec![String::new(); input],
            scratch: vec![String::new(); scratch],
            output: vec![String::new(); output],
        }
    }

    /// Replace the input area with `values`, padding or truncating to the
    /// area size. Scratch and output areas are cleared.
    pub fn load<I, S>(&mut self, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut values = values.into_iter();
        for slot in &mut self.input {
            *slot = values.next().map(Into::into).unwrap_or_default();
        }
        self.scratch.iter_mut().for_each(String::clear);
        self.output.iter_mut().for_each(String::clear);
    }

    /// Value at `field`.
    ///
    /// # Panics
    /// Panics if `field` lies outside the record. References produced by a
    /// validated chain never do.
    #[must_use]
    pub fn get(&self, field: FieldRef) -> &str {
        &self.area(field.area)[field.index]
    }

    /// Overwrite the value at `field`.
    ///
    /// # Panics
    /// Panics if `field` lies outside the record.
    pub fn set(&mut self, field: FieldRef, value: impl Into<String>) {
        self.area_mut(field.area)[field.index] = value.into();
    }

    /// All values in `area`.
    #[must_use]
    pub fn area(&self, area: Area) -> &[String] {
        match area {
            Area::Input => &self.input,
            Area::Scratch => &self.scratch,
            Area::Output => &self.output,
        }
    }

    fn area_mut(&mut self, area: Area) -> &mut [String] {
        match area {
            Area::Input => &mut self.input,
            Area::Scratch => &mut self.scratch,
            Area::Output => &mut self.output,
        }
    }
}
