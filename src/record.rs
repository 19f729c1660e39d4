//! Named-column access to flat per-event records
use ahash::{AHashMap, AHashSet};

use crate::error::ReadError;

/// Value of a single column in one record
#[derive(Clone, Debug, PartialEq)]
pub enum Column {
    Float(f64),
    Int(i64),
    Floats(Vec<f64>),
    Ints(Vec<i64>),
}

impl Column {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Float(_) => "float",
            Self::Int(_) => "int",
            Self::Floats(_) => "float array",
            Self::Ints(_) => "int array",
        }
    }
}

impl From<f64> for Column {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<i64> for Column {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<Vec<f64>> for Column {
    fn from(v: Vec<f64>) -> Self {
        Self::Floats(v)
    }
}

impl From<Vec<i64>> for Column {
    fn from(v: Vec<i64>) -> Self {
        Self::Ints(v)
    }
}

/// All columns of one record
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    columns: AHashMap<String, Column>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, col: impl Into<Column>) -> Self {
        self.insert(name, col);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, col: impl Into<Column>) {
        self.columns.insert(name.into(), col.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<Column> {
        self.columns.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    fn get(&self, name: &str) -> Result<&Column, ReadError> {
        self.columns
            .get(name)
            .ok_or_else(|| ReadError::MissingField(name.to_owned()))
    }

    /// Scalar as floating-point number, integers are converted
    pub fn float(&self, name: &str) -> Result<f64, ReadError> {
        match self.get(name)? {
            Column::Float(x) => Ok(*x),
            Column::Int(i) => Ok(*i as f64),
            col => Err(mismatch(name, "float", col)),
        }
    }

    /// Scalar that may be absent
    pub fn float_opt(&self, name: &str) -> Result<Option<f64>, ReadError> {
        if self.contains(name) {
            self.float(name).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn int(&self, name: &str) -> Result<i64, ReadError> {
        match self.get(name)? {
            Column::Int(i) => Ok(*i),
            col => Err(mismatch(name, "int", col)),
        }
    }

    /// Scalar flag, any non-zero value is `true`
    pub fn flag(&self, name: &str) -> Result<bool, ReadError> {
        match self.get(name)? {
            Column::Int(i) => Ok(*i != 0),
            Column::Float(x) => Ok(*x != 0.),
            col => Err(mismatch(name, "flag", col)),
        }
    }

    pub fn floats(&self, name: &str) -> Result<&[f64], ReadError> {
        match self.get(name)? {
            Column::Floats(v) => Ok(v),
            col => Err(mismatch(name, "float array", col)),
        }
    }

    pub fn ints(&self, name: &str) -> Result<&[i64], ReadError> {
        match self.get(name)? {
            Column::Ints(v) => Ok(v),
            col => Err(mismatch(name, "int array", col)),
        }
    }

    /// Array of flags, any non-zero entry is `true`
    pub fn flags(&self, name: &str) -> Result<Vec<bool>, ReadError> {
        match self.get(name)? {
            Column::Ints(v) => Ok(v.iter().map(|i| *i != 0).collect()),
            Column::Floats(v) => Ok(v.iter().map(|x| *x != 0.).collect()),
            col => Err(mismatch(name, "flag array", col)),
        }
    }

    /// Float array that must have the same length as the other arrays
    /// of its object category
    pub(crate) fn aligned_floats(
        &self,
        category: &'static str,
        name: &str,
        len: usize,
    ) -> Result<&[f64], ReadError> {
        let v = self.floats(name)?;
        check_len(category, name, len, v.len())?;
        Ok(v)
    }

    pub(crate) fn aligned_ints(
        &self,
        category: &'static str,
        name: &str,
        len: usize,
    ) -> Result<&[i64], ReadError> {
        let v = self.ints(name)?;
        check_len(category, name, len, v.len())?;
        Ok(v)
    }

    pub(crate) fn aligned_flags(
        &self,
        category: &'static str,
        name: &str,
        len: usize,
    ) -> Result<Vec<bool>, ReadError> {
        let v = self.flags(name)?;
        check_len(category, name, len, v.len())?;
        Ok(v)
    }
}

impl<S: Into<String>, C: Into<Column>> FromIterator<(S, C)> for Record {
    fn from_iter<T: IntoIterator<Item = (S, C)>>(iter: T) -> Self {
        let columns = iter
            .into_iter()
            .map(|(name, col)| (name.into(), col.into()))
            .collect();
        Self { columns }
    }
}

fn mismatch(field: &str, expected: &'static str, found: &Column) -> ReadError {
    ReadError::TypeMismatch {
        field: field.to_owned(),
        expected,
        found: found.type_name(),
    }
}

fn check_len(
    category: &'static str,
    field: &str,
    expected: usize,
    found: usize,
) -> Result<(), ReadError> {
    if expected == found {
        Ok(())
    } else {
        Err(ReadError::LengthMismatch {
            category,
            field: field.to_owned(),
            expected,
            found,
        })
    }
}

/// A columnar source of records
pub trait RecordSource {
    /// Whether every record provides the named field
    fn has_field(&self, name: &str) -> bool;

    /// Number of records
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load the record with the given entry number
    fn read(&mut self, entry: usize) -> Result<Record, ReadError>;
}

/// Records held in memory
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemorySource {
    fields: AHashSet<String>,
    records: Vec<Record>,
}

impl MemorySource {
    /// The schema consists of the fields present in every record
    pub fn new(records: Vec<Record>) -> Self {
        let mut fields: AHashSet<String> = records
            .first()
            .map(|r| r.field_names().map(str::to_owned).collect())
            .unwrap_or_default();
        for record in records.iter().skip(1) {
            fields.retain(|f| record.contains(f));
        }
        Self { fields, records }
    }

    /// Use an explicit schema, e.g. for sources without any records
    pub fn with_fields<I, S>(fields: I, records: Vec<Record>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            records,
        }
    }
}

impl RecordSource for MemorySource {
    fn has_field(&self, name: &str) -> bool {
        self.fields.contains(name)
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn read(&mut self, entry: usize) -> Result<Record, ReadError> {
        self.records
            .get(entry)
            .cloned()
            .ok_or(ReadError::EntryOutOfRange {
                entry,
                len: self.records.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        Record::new()
            .with("METpt", 42.5)
            .with("runNumber", 273158i64)
            .with("AK4pt", vec![60., 20.])
            .with("MUmediumID", vec![1i64, 0])
    }

    #[test]
    fn typed_access() {
        let r = record();
        assert_eq!(r.float("METpt").unwrap(), 42.5);
        assert_eq!(r.float("runNumber").unwrap(), 273158.);
        assert_eq!(r.int("runNumber").unwrap(), 273158);
        assert_eq!(r.floats("AK4pt").unwrap(), [60., 20.]);
        assert_eq!(r.flags("MUmediumID").unwrap(), [true, false]);
        assert_eq!(r.float_opt("METuncorrPt").unwrap(), None);
    }

    #[test]
    fn access_errors() {
        let r = record();
        assert_eq!(
            r.float("METphi"),
            Err(ReadError::MissingField("METphi".to_owned()))
        );
        assert!(matches!(
            r.int("METpt"),
            Err(ReadError::TypeMismatch { found: "float", .. })
        ));
        assert!(matches!(
            r.aligned_floats("jet", "AK4pt", 3),
            Err(ReadError::LengthMismatch { expected: 3, found: 2, .. })
        ));
    }

    #[test]
    fn memory_source_schema() {
        let mut source = MemorySource::new(vec![record(), Record::new().with("METpt", 1.)]);
        assert!(source.has_field("METpt"));
        assert!(!source.has_field("AK4pt"));
        assert_eq!(source.len(), 2);
        assert!(source.read(1).is_ok());
        assert_eq!(
            source.read(2),
            Err(ReadError::EntryOutOfRange { entry: 2, len: 2 })
        );
    }
}
