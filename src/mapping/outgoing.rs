//! Item to entity mapping.

use super::template::{UrlTemplate, expand};
use super::{Datatype, ItemToEntityMapping, OutgoingMappingConfig, RDF_TYPE, parse_datatype};
use crate::models::{Entity, EntityRef, Item, Value};
use crate::{Error, Result};
use std::collections::HashSet;

#[derive(Debug, Clone)]
enum Target {
    Identity(UrlTemplate),
    Reference {
        name: String,
        template: Option<UrlTemplate>,
    },
    Property(String),
    Deleted,
    Recorded,
}

#[derive(Debug, Clone)]
struct Rule {
    field: String,
    target: Target,
    required: bool,
    datatype: Option<Datatype>,
}

impl Rule {
    fn compile(base_uri: &str, mapping: &ItemToEntityMapping) -> Result<Self> {
        let field = mapping.property.clone();
        let entity_property = || {
            mapping
                .entity_property
                .as_deref()
                .filter(|name| !name.is_empty())
                .map(|name| expand(base_uri, name))
                .ok_or_else(|| {
                    Error::Configuration(format!("entity property {field} is required for mapping"))
                })
        };
        let target = if mapping.is_identity {
            let pattern = mapping.url_value_pattern.as_deref().ok_or_else(|| {
                Error::Configuration("url value pattern is required for identity property".into())
            })?;
            Target::Identity(UrlTemplate::new(pattern))
        } else if mapping.is_deleted {
            Target::Deleted
        } else if mapping.is_recorded {
            Target::Recorded
        } else if mapping.is_reference {
            Target::Reference {
                name: entity_property()?,
                template: mapping.url_value_pattern.as_deref().map(UrlTemplate::new),
            }
        } else {
            Target::Property(entity_property()?)
        };
        Ok(Self {
            target,
            required: mapping.required || mapping.is_identity,
            datatype: parse_datatype(mapping.datatype.as_deref())?,
            field,
        })
    }
}

/// Builds entities from items using one dataset's outgoing mapping.
///
/// Construction validates the whole configuration; [`map`](Self::map) only
/// fails for the record at hand.
///
/// # Example
///
/// ```rust
/// use datalayer::mapping::{ItemToEntityMapper, ItemToEntityMapping, OutgoingMappingConfig};
/// use datalayer::models::Item;
///
/// let config = OutgoingMappingConfig {
///     base_uri: "http://x/".to_string(),
///     property_mappings: vec![ItemToEntityMapping {
///         property: "id".to_string(),
///         is_identity: true,
///         url_value_pattern: Some("http://x/people/{value}".to_string()),
///         ..ItemToEntityMapping::default()
///     }],
///     map_all: true,
///     default_type: None,
/// };
/// let mapper = ItemToEntityMapper::new(&config)?;
/// let entity = mapper.map(&Item::new().with("id", "1").with("name", "Ada"))?;
/// assert_eq!(entity.id, "http://x/people/1");
/// assert!(entity.properties.contains_key("http://x/name"));
/// # Ok::<(), datalayer::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct ItemToEntityMapper {
    base_uri: String,
    rules: Vec<Rule>,
    map_all: bool,
    default_type: Option<String>,
}

impl ItemToEntityMapper {
    /// Compiles and validates a mapping configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error unless exactly one identity rule with a
    /// URL pattern exists, or when a property rule lacks its entity property.
    pub fn new(config: &OutgoingMappingConfig) -> Result<Self> {
        let rules = config
            .property_mappings
            .iter()
            .map(|mapping| Rule::compile(&config.base_uri, mapping))
            .collect::<Result<Vec<_>>>()?;

        let identities = rules
            .iter()
            .filter(|rule| matches!(rule.target, Target::Identity(_)))
            .count();
        if identities != 1 {
            return Err(Error::Configuration(format!(
                "exactly one identity property mapping is required, found {identities}"
            )));
        }

        Ok(Self {
            base_uri: config.base_uri.clone(),
            rules,
            map_all: config.map_all,
            default_type: config.default_type.clone(),
        })
    }

    /// Maps one item to an entity.
    ///
    /// # Errors
    ///
    /// Returns a validation error when a required or identity field is
    /// absent, or a type conversion error when a `datatype` coercion fails.
    /// No partial entity is produced.
    pub fn map(&self, item: &Item) -> Result<Entity> {
        let mut entity = Entity::default();
        let mut consumed: HashSet<&str> = HashSet::with_capacity(self.rules.len());

        for rule in &self.rules {
            consumed.insert(rule.field.as_str());
            let Some(value) = item.get_present(&rule.field) else {
                if rule.required {
                    return Err(Error::validation(
                        &rule.field,
                        format!("property {} is required", rule.field),
                    ));
                }
                continue;
            };
            let value = match rule.datatype {
                Some(datatype) => datatype.coerce(&rule.field, value)?,
                None => value.clone(),
            };

            match &rule.target {
                Target::Identity(template) => entity.id = template.render(&value.as_text()),
                Target::Reference { name, template } => {
                    entity.set_reference(name.as_str(), reference(template.as_ref(), &value));
                },
                Target::Property(name) => entity.set_property(name.as_str(), value),
                Target::Deleted => entity.deleted = value.is_truthy(),
                Target::Recorded => entity.recorded = Some(recorded(&rule.field, &value)?),
            }
        }

        if self.map_all {
            for (name, value) in item.native() {
                if !consumed.contains(name.as_str()) && !value.is_null() {
                    entity.set_property(expand(&self.base_uri, name), value.clone());
                }
            }
        }

        if let Some(default_type) = &self.default_type {
            entity.set_reference(
                RDF_TYPE,
                EntityRef::One(expand(&self.base_uri, default_type)),
            );
        }

        Ok(entity)
    }
}

fn reference(template: Option<&UrlTemplate>, value: &Value) -> EntityRef {
    let render = |value: &Value| {
        let text = value.as_text();
        template.map_or_else(|| text.clone(), |t| t.render(&text))
    };
    match value {
        Value::Sequence(values) => EntityRef::Many(values.iter().map(render).collect()),
        other => EntityRef::One(render(other)),
    }
}

fn recorded(field: &str, value: &Value) -> Result<u64> {
    let fail = || Error::TypeConversion {
        field: field.to_string(),
        expected: "recorded timestamp".to_string(),
        actual: value.to_string(),
    };
    match Datatype::Integer.coerce(field, value)? {
        Value::Integer(i) => u64::try_from(i).map_err(|_| fail()),
        _ => Err(fail()),
    }
}
