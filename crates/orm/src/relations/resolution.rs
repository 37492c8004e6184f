//! Relation Resolution - turns authored relation declarations into fully
//! populated relation metadata, inferring default keys by naming convention

use crate::error::{OrmError, OrmResult};
use crate::model::ModelDefinition;
use crate::relations::metadata::{
    RelationDefinition, RelationKind, ResolvedRelation, ResolvedThrough,
};

/// Convert an underscore-separated name to camelCase
pub fn camel_case(name: &str) -> String {
    let mut parts = name.split('_').filter(|part| !part.is_empty());
    let mut result = match parts.next() {
        Some(first) => first.to_lowercase(),
        None => return name.to_string(),
    };
    for part in parts {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            result.extend(first.to_uppercase());
            result.extend(chars.flat_map(|c| c.to_lowercase()));
        }
    }
    result
}

/// Conventional foreign-key property name for a model
/// (`Customer` -> `customerId`)
pub fn default_foreign_key(model_name: &str) -> String {
    camel_case(&format!("{}_id", model_name))
}

fn invalid(definition: &RelationDefinition, reason: impl Into<String>) -> OrmError {
    OrmError::invalid_relation(
        definition.source.name.clone(),
        definition.name.clone(),
        reason,
    )
}

fn ensure_kind(definition: &RelationDefinition, expected: RelationKind) -> OrmResult<()> {
    if definition.kind != expected {
        return Err(invalid(
            definition,
            format!(
                "expected a {:?} relation but the definition is typed {:?}",
                expected, definition.kind
            ),
        ));
    }
    Ok(())
}

fn target_definition(definition: &RelationDefinition) -> OrmResult<ModelDefinition> {
    definition
        .target
        .as_ref()
        .map(|resolver| resolver.resolve())
        .ok_or_else(|| invalid(definition, "target model resolver is missing"))
}

/// Pick an explicitly-given key when it exists on the model, otherwise fall
/// back to the default name (which must exist).
fn resolve_key(model: &ModelDefinition, explicit: Option<&str>, default_name: &str) -> Option<String> {
    if let Some(key) = explicit_existing_key(model, explicit) {
        return Some(key);
    }
    model
        .has_property(default_name)
        .then(|| default_name.to_string())
}

/// An explicitly-given key, kept only when the model actually declares it
fn explicit_existing_key(model: &ModelDefinition, explicit: Option<&str>) -> Option<String> {
    explicit
        .filter(|key| model.has_property(key))
        .map(str::to_string)
}

fn first_id_property(
    definition: &RelationDefinition,
    model: &ModelDefinition,
    role: &str,
) -> OrmResult<String> {
    model
        .id_properties()
        .first()
        .map(|name| name.to_string())
        .ok_or_else(|| {
            invalid(
                definition,
                format!("{} model \"{}\" has no id property", role, model.name),
            )
        })
}

fn resolved(
    definition: &RelationDefinition,
    target: &ModelDefinition,
    key_from: String,
    key_to: String,
    through: Option<ResolvedThrough>,
) -> ResolvedRelation {
    ResolvedRelation {
        kind: definition.kind,
        name: definition.name.clone(),
        source_model: definition.source.name.clone(),
        target_model: target.name.clone(),
        key_from,
        key_to,
        targets_many: definition.kind.targets_many(),
        polymorphic: false,
        through,
    }
}

/// Resolve a belongsTo declaration.
///
/// The foreign key lives on the source side: `key_from` defaults to
/// `camelCase(<TargetModel>_id)` on the source, `key_to` to the target's
/// first id property.
pub fn resolve_belongs_to_metadata(
    definition: &RelationDefinition,
) -> OrmResult<ResolvedRelation> {
    ensure_kind(definition, RelationKind::BelongsTo)?;
    let target = target_definition(definition)?;

    let default_from = default_foreign_key(&target.name);
    let key_from = resolve_key(&definition.source, definition.key_from.as_deref(), &default_from)
        .ok_or_else(|| {
            invalid(
                definition,
                format!(
                    "source model \"{}\" is missing foreign key property \"{}\"",
                    definition.source.name, default_from
                ),
            )
        })?;

    let key_to = match explicit_existing_key(&target, definition.key_to.as_deref()) {
        Some(key) => key,
        None => first_id_property(definition, &target, "target")?,
    };

    Ok(resolved(definition, &target, key_from, key_to, None))
}

fn resolve_source_keyed(
    definition: &RelationDefinition,
    expected: RelationKind,
) -> OrmResult<ResolvedRelation> {
    ensure_kind(definition, expected)?;
    let target = target_definition(definition)?;

    let key_from = match explicit_existing_key(&definition.source, definition.key_from.as_deref()) {
        Some(key) => key,
        None => first_id_property(definition, &definition.source, "source")?,
    };

    let default_to = default_foreign_key(&definition.source.name);
    let key_to = resolve_key(&target, definition.key_to.as_deref(), &default_to).ok_or_else(|| {
        invalid(
            definition,
            format!(
                "target model \"{}\" is missing foreign key property \"{}\"",
                target.name, default_to
            ),
        )
    })?;

    Ok(resolved(definition, &target, key_from, key_to, None))
}

/// Resolve a hasOne declaration (target carries the foreign key).
pub fn resolve_has_one_metadata(definition: &RelationDefinition) -> OrmResult<ResolvedRelation> {
    resolve_source_keyed(definition, RelationKind::HasOne)
}

/// Resolve a hasMany declaration (targets carry the foreign key).
pub fn resolve_has_many_metadata(definition: &RelationDefinition) -> OrmResult<ResolvedRelation> {
    resolve_source_keyed(definition, RelationKind::HasMany)
}

fn resolve_junction_keyed(
    definition: &RelationDefinition,
    expected: RelationKind,
) -> OrmResult<ResolvedRelation> {
    ensure_kind(definition, expected)?;
    let target = target_definition(definition)?;

    let through = definition
        .through
        .as_ref()
        .ok_or_else(|| invalid(definition, "through configuration is missing"))?;
    let junction = through
        .model
        .as_ref()
        .map(|resolver| resolver.resolve())
        .ok_or_else(|| invalid(definition, "through model resolver is missing"))?;

    let key_from = match explicit_existing_key(&definition.source, definition.key_from.as_deref()) {
        Some(key) => key,
        None => first_id_property(definition, &definition.source, "source")?,
    };

    let default_source_key = default_foreign_key(&definition.source.name);
    let source_key = resolve_key(&junction, through.source_key.as_deref(), &default_source_key)
        .ok_or_else(|| {
            invalid(
                definition,
                format!(
                    "junction model \"{}\" is missing property \"{}\"",
                    junction.name, default_source_key
                ),
            )
        })?;

    let default_target_key = default_foreign_key(&target.name);
    let target_key = resolve_key(&junction, through.target_key.as_deref(), &default_target_key)
        .ok_or_else(|| {
            invalid(
                definition,
                format!(
                    "junction model \"{}\" is missing property \"{}\"",
                    junction.name, default_target_key
                ),
            )
        })?;

    let key_to = match explicit_existing_key(&target, definition.key_to.as_deref()) {
        Some(key) => key,
        None => first_id_property(definition, &target, "target")?,
    };

    Ok(resolved(
        definition,
        &target,
        key_from,
        key_to,
        Some(ResolvedThrough {
            model: junction.name,
            source_key,
            target_key,
        }),
    ))
}

/// Resolve a hasManyThrough declaration.
pub fn resolve_has_many_through_metadata(
    definition: &RelationDefinition,
) -> OrmResult<ResolvedRelation> {
    resolve_junction_keyed(definition, RelationKind::HasManyThrough)
}

/// Resolve a hasAndBelongsToMany declaration.
pub fn resolve_has_and_belongs_to_many_metadata(
    definition: &RelationDefinition,
) -> OrmResult<ResolvedRelation> {
    resolve_junction_keyed(definition, RelationKind::HasAndBelongsToMany)
}

/// Resolve any relation declaration by its declared kind.
pub fn resolve_relation_metadata(definition: &RelationDefinition) -> OrmResult<ResolvedRelation> {
    match definition.kind {
        RelationKind::BelongsTo => resolve_belongs_to_metadata(definition),
        RelationKind::HasOne => resolve_has_one_metadata(definition),
        RelationKind::HasMany => resolve_has_many_metadata(definition),
        RelationKind::HasManyThrough => resolve_has_many_through_metadata(definition),
        RelationKind::HasAndBelongsToMany => resolve_has_and_belongs_to_many_metadata(definition),
    }
}
