use quarry_core::{Error, ErrorKind, Result, SourceDef, Value, ValueMap, error};

/// Rows of one source.
#[derive(Debug, Default, Clone)]
pub struct Table {
    rows: Vec<ValueMap>,
}

impl Table {
    pub fn rows(&self) -> &[ValueMap] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Complete `data` into a storable row: declared columns default to null
    /// and a single integer primary key left null is generated.
    fn complete(&self, def: &SourceDef, mut data: ValueMap) -> Result<ValueMap> {
        if !def.columns.is_empty() {
            if let Some(unknown) = data.keys().find(|k| !def.has_column(k)) {
                return Err(Error::msg(format!(
                    "Table `{}` has no column named `{}`",
                    def.name, unknown
                )));
            }
            for column in &def.columns {
                data.entry(column.clone()).or_insert(Value::Null);
            }
        }
        if let [pk] = def.primary_key.as_slice() {
            if data.get(pk).is_none_or(Value::is_null) {
                let next = self
                    .rows
                    .iter()
                    .filter_map(|r| r.get(pk).and_then(Value::as_i64))
                    .max()
                    .unwrap_or(0)
                    + 1;
                data.insert(pk.clone(), Value::Int64(next));
            }
        }
        Ok(data)
    }

    /// Fails with a tagged uniqueness error when `candidate` collides with
    /// another row on the primary key or on a unique constraint.
    fn check_unique(&self, def: &SourceDef, candidate: &ValueMap, skip: Option<usize>) -> Result<()> {
        let keys = std::iter::once(&def.primary_key)
            .chain(def.unique_constraints.iter().map(|u| &u.columns))
            .filter(|columns| !columns.is_empty());
        for columns in keys {
            let values: Vec<&Value> = columns
                .iter()
                .map(|c| candidate.get(c).unwrap_or(&Value::Null))
                .collect();
            if values.iter().any(|v| v.is_null()) {
                continue;
            }
            let collision = self.rows.iter().enumerate().any(|(i, row)| {
                Some(i) != skip
                    && columns
                        .iter()
                        .zip(&values)
                        .all(|(c, v)| row.get(c).is_some_and(|r| r.loosely_equals(v)))
            });
            if collision {
                let e = error(
                    ErrorKind::UniqueViolation,
                    format!(
                        "UNIQUE constraint failed: {}",
                        columns
                            .iter()
                            .map(|c| format!("{}.{}", def.name, c))
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                );
                return Err(e);
            }
        }
        Ok(())
    }

    pub(crate) fn insert(&mut self, def: &SourceDef, data: ValueMap) -> Result<ValueMap> {
        let row = self.complete(def, data)?;
        self.check_unique(def, &row, None)?;
        self.rows.push(row.clone());
        Ok(row)
    }

    /// Apply `data` to the rows at `indexes`, all or nothing.
    pub(crate) fn update(&mut self, def: &SourceDef, indexes: &[usize], data: &ValueMap) -> Result<u64> {
        if let Some(unknown) = data
            .keys()
            .find(|k| !def.columns.is_empty() && !def.has_column(k))
        {
            return Err(Error::msg(format!(
                "Table `{}` has no column named `{}`",
                def.name, unknown
            )));
        }
        let mut updated = self.clone();
        for &i in indexes {
            let mut row = updated.rows[i].clone();
            row.extend(data.iter().map(|(k, v)| (k.clone(), v.clone())));
            updated.check_unique(def, &row, Some(i))?;
            updated.rows[i] = row;
        }
        *self = updated;
        Ok(indexes.len() as u64)
    }

    pub(crate) fn delete(&mut self, indexes: &[usize]) -> u64 {
        let before = self.rows.len();
        let mut i = 0;
        self.rows.retain(|_| {
            let keep = !indexes.contains(&i);
            i += 1;
            keep
        });
        (before - self.rows.len()) as u64
    }
}
