//! Binding of header columns to field descriptors.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::{
    core::{
        config::DuplicateHeaderPolicy,
        schema::{FieldDescriptor, Schema},
    },
    error::ConfigurationError,
};

/// Descriptor bound to each input column. Unmatched columns hold `None` and are ignored.
#[derive(Debug, Clone, Default)]
pub struct HeaderBinding {
    columns: Vec<Option<FieldDescriptor>>,
}

impl HeaderBinding {
    /// Binds normalized `headers` against `schema`.
    pub fn bind(
        headers: &[String],
        schema: &Schema,
        policy: DuplicateHeaderPolicy,
    ) -> Result<HeaderBinding, ConfigurationError> {
        if policy == DuplicateHeaderPolicy::Fail {
            ensure_unique(headers)?;
        }

        let mut seen: HashMap<&str, usize> = HashMap::new();
        let columns: Vec<Option<FieldDescriptor>> = headers
            .iter()
            .map(|header| {
                let occurrence = match policy {
                    DuplicateHeaderPolicy::AlignWithFieldOrder => {
                        seen.get(header.as_str()).copied().unwrap_or(0)
                    }
                    _ => 0,
                };
                let bound = schema
                    .fields()
                    .iter()
                    .filter(|field| field.matches(header))
                    .nth(occurrence)
                    .cloned()
                    .or_else(|| {
                        (occurrence == 0)
                            .then(|| schema.expand_indexed(header))
                            .flatten()
                    });
                if bound.is_some() {
                    *seen.entry(header.as_str()).or_default() += 1;
                }
                bound
            })
            .collect();

        let binding = HeaderBinding { columns };
        debug!(
            "bound {} of {} header columns to {}",
            binding.matched(),
            binding.len(),
            schema.type_name()
        );
        Ok(binding)
    }

    /// Headerless input: columns bind to the schema's columns in declaration order.
    pub fn positional(schema: &Schema) -> HeaderBinding {
        HeaderBinding {
            columns: schema.columns().cloned().map(Some).collect(),
        }
    }

    pub fn get(&self, column: usize) -> Option<&FieldDescriptor> {
        self.columns.get(column).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn matched(&self) -> usize {
        self.columns.iter().flatten().count()
    }

    /// Keys of required fields that no bound column supplies.
    pub fn unmatched_required(&self, schema: &Schema) -> Vec<Vec<String>> {
        let bound: Vec<&FieldDescriptor> = self.columns.iter().flatten().collect();
        schema
            .columns()
            .filter(|field| field.is_required() && !bound.iter().any(|b| b.covers(field)))
            .map(|field| field.keys().to_vec())
            .collect()
    }
}

/// Rejects header rows that name a column twice.
pub fn ensure_unique(headers: &[String]) -> Result<(), ConfigurationError> {
    let mut seen = HashSet::new();
    match headers.iter().find(|header| !seen.insert(header.as_str())) {
        Some(header) => Err(ConfigurationError::DuplicateHeader(header.clone())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{core::config::SchemaConfig, record};

    #[derive(Debug, Default)]
    struct Pair {
        first: String,
        second: String,
        count: i32,
        ints: Vec<i32>,
    }

    record! {
        Pair {
            first: r#"csv:"name""#,
            second: r#"csv:"name""#,
            count: r#"csv:"count,omitempty""#,
            ints: r#"csv:"ints" csv[]:"""#,
        }
    }

    fn schema() -> Schema {
        Schema::for_decoding::<Pair>(&SchemaConfig::default()).unwrap()
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn bound_chain(binding: &HeaderBinding, column: usize) -> Vec<crate::core::schema::Step> {
        binding.get(column).unwrap().chain().to_vec()
    }

    #[test]
    fn last_wins_binds_every_duplicate_to_the_first_field() {
        let schema = schema();
        let binding = HeaderBinding::bind(
            &headers(&["name", "name"]),
            &schema,
            DuplicateHeaderPolicy::LastWins,
        )
        .unwrap();
        assert_eq!(bound_chain(&binding, 0), bound_chain(&binding, 1));
    }

    #[test]
    fn aligned_duplicates_follow_field_order() {
        let schema = schema();
        let binding = HeaderBinding::bind(
            &headers(&["name", "name", "name"]),
            &schema,
            DuplicateHeaderPolicy::AlignWithFieldOrder,
        )
        .unwrap();
        assert_ne!(bound_chain(&binding, 0), bound_chain(&binding, 1));
        assert!(binding.get(2).is_none());
        assert_eq!(binding.matched(), 2);
    }

    #[test]
    fn fail_policy_rejects_duplicates() {
        let err = HeaderBinding::bind(
            &headers(&["name", "count", "name"]),
            &schema(),
            DuplicateHeaderPolicy::Fail,
        )
        .unwrap_err();
        assert_eq!(err, ConfigurationError::DuplicateHeader("name".to_string()));
    }

    #[test]
    fn unknown_headers_are_ignored_and_elements_expand() {
        let schema = schema();
        let binding = HeaderBinding::bind(
            &headers(&["extra", "ints[3]", "ints"]),
            &schema,
            DuplicateHeaderPolicy::LastWins,
        )
        .unwrap();
        assert!(binding.get(0).is_none());
        assert_eq!(binding.get(1).unwrap().first_key(), "ints[3]");
        assert_eq!(binding.get(2).unwrap().first_key(), "ints");
    }

    #[test]
    fn reports_unmatched_required_fields() {
        let schema = schema();
        let binding =
            HeaderBinding::bind(&headers(&["count"]), &schema, DuplicateHeaderPolicy::LastWins)
                .unwrap();
        assert_eq!(
            binding.unmatched_required(&schema),
            vec![vec!["name".to_string()], vec!["name".to_string()]]
        );
    }

    #[test]
    fn a_present_key_satisfies_every_field_declaring_it() {
        let schema = schema();
        let binding =
            HeaderBinding::bind(&headers(&["name"]), &schema, DuplicateHeaderPolicy::LastWins)
                .unwrap();
        assert!(binding.unmatched_required(&schema).is_empty());
    }

    #[test]
    fn positional_binding_uses_declaration_order() {
        let schema = schema();
        let binding = HeaderBinding::positional(&schema);
        let keys: Vec<_> = (0..binding.len())
            .map(|column| binding.get(column).unwrap().first_key().to_string())
            .collect();
        assert_eq!(keys, vec!["name", "name", "count", "ints[0]"]);
    }
}
