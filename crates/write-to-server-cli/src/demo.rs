//! Demo entity and context used by `seed` and `describe`.

use chrono::NaiveDateTime;
use write_to_server::{
    ColumnMapping, DbContext, Entity, ModelBuilder, Property, Settings, SqlType, SqlValue,
    TableMapping,
};

pub const DEMO_SCHEMA: &str = "dbo";
pub const DEMO_TABLE: &str = "WriteToServerDemo";

/// One generated row of the demo table.
#[derive(Debug, Clone)]
pub struct DemoRow {
    pub id: i32,
    pub name: Option<String>,
    pub email: String,
    pub created_at: NaiveDateTime,
}

impl Entity for DemoRow {
    fn properties() -> &'static [Property<Self>] {
        const PROPERTIES: &[Property<DemoRow>] = &[
            Property::required("Id", SqlType::I32, |r| SqlValue::I32(r.id)),
            Property::optional("Name", SqlType::String, |r| {
                SqlValue::nullable(r.name.as_deref(), SqlType::String)
            }),
            Property::required("Email", SqlType::String, |r| SqlValue::from(&r.email)),
            Property::required("CreatedAt", SqlType::DateTime, |r| {
                SqlValue::DateTime(r.created_at)
            }),
        ];
        PROPERTIES
    }
}

pub fn demo_mapping() -> TableMapping {
    TableMapping::new(DEMO_SCHEMA, DEMO_TABLE)
        .column(ColumnMapping::new("Id").identity().primary_key())
        .column(ColumnMapping::new("Name").max_length(100))
        .column(ColumnMapping::new("Email").max_length(254))
        .column(ColumnMapping::new("CreatedAt"))
}

/// Generate `count` rows; every third row has no name.
pub fn generate_rows(count: usize, created_at: NaiveDateTime) -> Vec<DemoRow> {
    (1..=count)
        .map(|i| DemoRow {
            id: 0,
            name: (i % 3 != 0).then(|| format!("User {}", i)),
            email: format!("user{}@example.com", i),
            created_at,
        })
        .collect()
}

/// Context named after the connection string chosen on the command line.
pub struct SeedContext {
    name: String,
    settings: Settings,
}

impl SeedContext {
    pub fn new(name: impl Into<String>, settings: Settings) -> Self {
        Self {
            name: name.into(),
            settings,
        }
    }
}

impl DbContext for SeedContext {
    fn name(&self) -> &str {
        &self.name
    }

    fn settings(&self) -> &Settings {
        &self.settings
    }

    fn on_model_creating(&self, model: &mut ModelBuilder) {
        model.entity::<DemoRow>(demo_mapping());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use write_to_server::create_buffer;

    #[test]
    fn test_generated_rows_fit_mapping() {
        let at = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let rows = generate_rows(6, at);
        let mapping = demo_mapping().resolve::<DemoRow>().unwrap();

        let buffer = create_buffer(&mapping, &rows).unwrap();
        assert_eq!(buffer.len(), 6);
        assert_eq!(rows.iter().filter(|r| r.name.is_none()).count(), 2);
    }
}
