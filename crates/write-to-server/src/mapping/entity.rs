//! Static property descriptors for entity types.
//!
//! An entity declares its properties once, as a `'static` table of name,
//! type and accessor. Column mappings are matched against this table when
//! they are registered, so building a buffer never looks a property up by
//! name.

use std::fmt;

use crate::core::{SqlType, SqlValue};

/// Reads one property from an entity, lending its data where possible.
pub type PropertyReader<E> = for<'a> fn(&'a E) -> SqlValue<'a>;

/// Descriptor for a single entity property.
pub struct Property<E: 'static> {
    /// Property name, matched against `ColumnMapping::property_name`.
    pub name: &'static str,

    /// Underlying value type (`T` for an `Option<T>` property).
    pub sql_type: SqlType,

    /// Whether the property is an `Option<T>`.
    pub optional: bool,

    /// Accessor returning the property's value.
    pub read: PropertyReader<E>,
}

impl<E: 'static> Property<E> {
    /// Descriptor for a property that always has a value.
    pub const fn required(name: &'static str, sql_type: SqlType, read: PropertyReader<E>) -> Self {
        Self {
            name,
            sql_type,
            optional: false,
            read,
        }
    }

    /// Descriptor for an `Option<T>` property; `None` is read as NULL.
    pub const fn optional(name: &'static str, sql_type: SqlType, read: PropertyReader<E>) -> Self {
        Self {
            name,
            sql_type,
            optional: true,
            read,
        }
    }
}

impl<E: 'static> fmt::Debug for Property<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("sql_type", &self.sql_type)
            .field("optional", &self.optional)
            .finish()
    }
}

/// A type whose values can be bulk-inserted.
///
/// # Example
///
/// ```rust
/// use write_to_server::core::{SqlType, SqlValue};
/// use write_to_server::mapping::{Entity, Property};
///
/// struct Person {
///     id: i32,
///     name: Option<String>,
/// }
///
/// impl Entity for Person {
///     fn properties() -> &'static [Property<Self>] {
///         const PROPERTIES: &[Property<Person>] = &[
///             Property::required("Id", SqlType::I32, |p| SqlValue::I32(p.id)),
///             Property::optional("Name", SqlType::String, |p| {
///                 SqlValue::nullable(p.name.as_deref(), SqlType::String)
///             }),
///         ];
///         PROPERTIES
///     }
/// }
///
/// assert_eq!(Person::properties().len(), 2);
/// ```
pub trait Entity: Sized + 'static {
    /// Property descriptors in declaration order.
    fn properties() -> &'static [Property<Self>];

    /// Short type name used in log and error messages.
    fn entity_name() -> &'static str {
        short_type_name::<Self>()
    }
}

/// Last path segment of a type name (`shop::Person` -> `Person`).
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Widget {
        sku: String,
        weight: Option<f64>,
    }

    impl Entity for Widget {
        fn properties() -> &'static [Property<Self>] {
            const PROPERTIES: &[Property<Widget>] = &[
                Property::required("Sku", SqlType::String, |w| SqlValue::from(&w.sku)),
                Property::optional("Weight", SqlType::F64, |w| {
                    SqlValue::nullable(w.weight, SqlType::F64)
                }),
            ];
            PROPERTIES
        }
    }

    #[test]
    fn test_accessors_read_values() {
        let widget = Widget {
            sku: "W-1".to_string(),
            weight: None,
        };
        let props = Widget::properties();

        assert_eq!((props[0].read)(&widget), SqlValue::from("W-1"));
        assert_eq!((props[1].read)(&widget), SqlValue::Null(SqlType::F64));
        assert!(props[1].optional);
        assert!(!props[0].optional);
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(Widget::entity_name(), "Widget");
        assert_eq!(short_type_name::<Vec<String>>(), "Vec");
    }
}
