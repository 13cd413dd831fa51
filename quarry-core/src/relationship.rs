use crate::{Condition, ErrorKind, RelationshipDef, Result, SchemaMetadata, error, qualify};

/// A relationship traversal: where it lands and how to join back.
#[derive(Debug, Clone, PartialEq)]
pub struct Pivot {
    pub target: String,
    /// Relationship on the target leading back to the original source.
    pub reverse: String,
    /// Condition of the original result set rewritten against `reverse`.
    pub condition: Condition,
}

/// Relationship on `target` that leads back to `source` along `forward`.
///
/// Prefers the one whose join mirrors `forward`, falls back to the first one
/// pointing at `source`.
pub fn reverse_relationship<'a>(
    metadata: &'a dyn SchemaMetadata,
    source: &str,
    forward: &RelationshipDef,
) -> Result<&'a RelationshipDef> {
    let target = metadata.source_def(&forward.target)?;
    let back = || target.relationships.iter().filter(|r| r.target == source);
    back()
        .find(|r| r.join.mirrors(&forward.join))
        .or_else(|| back().next())
        .ok_or_else(|| {
            let e = error(
                ErrorKind::UnresolvedReverseRelationship,
                format!(
                    "No relationship on `{}` leads back to `{}` through `{}`",
                    forward.target, source, forward.name
                ),
            );
            log::error!("{:#}", e);
            e
        })
}

/// Move `condition` of a result set over `source` onto the target of `relationship`.
///
/// Unqualified and `me.` keys get the reverse alias, keys already qualified
/// by another alias are left alone.
pub fn pivot(
    metadata: &dyn SchemaMetadata,
    source: &str,
    relationship: &str,
    condition: Condition,
) -> Result<Pivot> {
    let forward = metadata.relationship_info(source, relationship)?;
    let reverse = reverse_relationship(metadata, source, forward)?;
    let alias = reverse.name.clone();
    log::trace!(
        "Pivoting `{}` through `{}` onto `{}`, joining back as `{}`",
        source,
        relationship,
        forward.target,
        alias
    );
    Ok(Pivot {
        target: forward.target.clone(),
        condition: condition.map_keys(&|key| qualify(&alias, key)),
        reverse: alias,
    })
}
