use crate::{Condition, ErrorKind, Result, SourceDef, ValueMap, error};

/// Lookup condition identifying the row `data` describes.
///
/// With a named `constraint` only its columns are used (`primary` names the
/// primary key). Otherwise the primary key is adopted when any of its columns
/// is present, then the first unique constraint whose columns are all present.
/// Columns may be given bare or `me.` qualified. When nothing applies, the
/// lookup is `data` itself.
pub fn resolve_unique(
    data: &ValueMap,
    constraint: Option<&str>,
    source: &SourceDef,
) -> Result<Condition> {
    let get = |column: &str| {
        data.get(column)
            .or_else(|| data.get(&format!("me.{column}")))
    };
    let columns: Option<&[String]> = match constraint {
        Some("primary") => Some(&source.primary_key),
        Some(name) => {
            let Some(unique) = source.unique_constraints.iter().find(|u| u.name == name) else {
                return Err(error(
                    ErrorKind::Validation,
                    format!("Source `{}` has no unique constraint named `{}`", source.name, name),
                ));
            };
            Some(&unique.columns)
        }
        None if source.primary_key.iter().any(|c| get(c).is_some()) => Some(&source.primary_key),
        None => source
            .unique_constraints
            .iter()
            .find(|u| !u.columns.is_empty() && u.columns.iter().all(|c| get(c).is_some()))
            .map(|u| u.columns.as_slice()),
    };
    let lookup: ValueMap = columns
        .unwrap_or_default()
        .iter()
        .filter_map(|c| get(c).map(|v| (c.clone(), v.clone())))
        .collect();
    if lookup.is_empty() {
        log::trace!(
            "No unique constraint of `{}` covers the lookup data, using it whole",
            source.name
        );
        return Ok(Condition::from(data.clone()));
    }
    Ok(Condition::Eq(lookup))
}
