//! Named DDL and seed statements applied by the schema bootstrapper.
//!
//! Every statement is self-guarding (`IF NOT EXISTS`, `CREATE OR REPLACE`,
//! `WHERE NOT EXISTS`), so applying one a second time is harmless. The
//! bootstrapper still checks before applying table, routine and seed entries
//! so that a re-run is silent.

use std::fmt;

/// Key of one catalog entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CatalogKey {
    RdpgExtensions,
    RdpgSchemas,
    CreateTableCfsbServices,
    CreateTableCfsbPlans,
    CreateTableCfsbInstances,
    CreateTableCfsbBindings,
    CreateTableCfsbCredentials,
    CreateTableCfsbProvisionSteps,
    CreateTableRdpgWatchNotifications,
    InsertDefaultCfsbServices,
    InsertDefaultCfsbPlans,
    PostgresSchemas,
    CreateFunctionRdpgDisableDatabase,
}

/// What a catalog entry creates, used to look it up before applying.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CatalogTarget {
    /// Always applied; the statement guards itself.
    Unchecked,
    Table {
        schema: &'static str,
        table: &'static str,
    },
    Routine {
        schema: &'static str,
        name: &'static str,
    },
    /// A seed row identified by its `name` column.
    NamedRow {
        schema: &'static str,
        table: &'static str,
    },
    /// A plan row identified by its service's name and its own name.
    ServicePlan,
}

impl CatalogKey {
    /// Entries that are safe to run unconditionally on the control database.
    pub const CONTROL_ALWAYS: [CatalogKey; 2] = [Self::RdpgExtensions, Self::RdpgSchemas];

    /// Control-database tables, in dependency order.
    pub const CONTROL_TABLES: [CatalogKey; 7] = [
        Self::CreateTableCfsbServices,
        Self::CreateTableCfsbPlans,
        Self::CreateTableCfsbInstances,
        Self::CreateTableCfsbBindings,
        Self::CreateTableCfsbCredentials,
        Self::CreateTableCfsbProvisionSteps,
        Self::CreateTableRdpgWatchNotifications,
    ];

    /// Seed rows, applied after their tables exist.
    pub const SEEDS: [CatalogKey; 2] = [Self::InsertDefaultCfsbServices, Self::InsertDefaultCfsbPlans];

    /// Routines installed in every node's admin database.
    pub const NODE_ROUTINES: [CatalogKey; 1] = [Self::CreateFunctionRdpgDisableDatabase];

    /// Every key, in application order.
    pub const ALL: [CatalogKey; 13] = [
        Self::RdpgExtensions,
        Self::RdpgSchemas,
        Self::CreateTableCfsbServices,
        Self::CreateTableCfsbPlans,
        Self::CreateTableCfsbInstances,
        Self::CreateTableCfsbBindings,
        Self::CreateTableCfsbCredentials,
        Self::CreateTableCfsbProvisionSteps,
        Self::CreateTableRdpgWatchNotifications,
        Self::InsertDefaultCfsbServices,
        Self::InsertDefaultCfsbPlans,
        Self::PostgresSchemas,
        Self::CreateFunctionRdpgDisableDatabase,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RdpgExtensions => "rdpg_extensions",
            Self::RdpgSchemas => "rdpg_schemas",
            Self::CreateTableCfsbServices => "create_table_cfsb_services",
            Self::CreateTableCfsbPlans => "create_table_cfsb_plans",
            Self::CreateTableCfsbInstances => "create_table_cfsb_instances",
            Self::CreateTableCfsbBindings => "create_table_cfsb_bindings",
            Self::CreateTableCfsbCredentials => "create_table_cfsb_credentials",
            Self::CreateTableCfsbProvisionSteps => "create_table_cfsb_provision_steps",
            Self::CreateTableRdpgWatchNotifications => "create_table_rdpg_watch_notifications",
            Self::InsertDefaultCfsbServices => "insert_default_cfsb_services",
            Self::InsertDefaultCfsbPlans => "insert_default_cfsb_plans",
            Self::PostgresSchemas => "postgres_schemas",
            Self::CreateFunctionRdpgDisableDatabase => "create_function_rdpg_disable_database",
        }
    }

    pub fn target(&self) -> CatalogTarget {
        let table = |schema, table| CatalogTarget::Table { schema, table };
        match self {
            Self::RdpgExtensions | Self::RdpgSchemas | Self::PostgresSchemas => {
                CatalogTarget::Unchecked
            }
            Self::CreateTableCfsbServices => table("cfsb", "services"),
            Self::CreateTableCfsbPlans => table("cfsb", "plans"),
            Self::CreateTableCfsbInstances => table("cfsb", "instances"),
            Self::CreateTableCfsbBindings => table("cfsb", "bindings"),
            Self::CreateTableCfsbCredentials => table("cfsb", "credentials"),
            Self::CreateTableCfsbProvisionSteps => table("cfsb", "provision_steps"),
            Self::CreateTableRdpgWatchNotifications => table("rdpg", "watch_notifications"),
            Self::InsertDefaultCfsbServices => CatalogTarget::NamedRow {
                schema: "cfsb",
                table: "services",
            },
            Self::InsertDefaultCfsbPlans => CatalogTarget::ServicePlan,
            Self::CreateFunctionRdpgDisableDatabase => CatalogTarget::Routine {
                schema: "rdpg",
                name: "disable_database",
            },
        }
    }
}

impl fmt::Display for CatalogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One keyed SQL text.
#[derive(Clone, Copy, Debug)]
pub struct CatalogEntry {
    pub key: CatalogKey,
    pub sql: &'static str,
}

static STANDARD_ENTRIES: &[CatalogEntry] = &[
    CatalogEntry {
        key: CatalogKey::RdpgExtensions,
        sql: include_str!("sql/rdpg_extensions.sql"),
    },
    CatalogEntry {
        key: CatalogKey::RdpgSchemas,
        sql: include_str!("sql/rdpg_schemas.sql"),
    },
    CatalogEntry {
        key: CatalogKey::CreateTableCfsbServices,
        sql: include_str!("sql/cfsb_services.sql"),
    },
    CatalogEntry {
        key: CatalogKey::CreateTableCfsbPlans,
        sql: include_str!("sql/cfsb_plans.sql"),
    },
    CatalogEntry {
        key: CatalogKey::CreateTableCfsbInstances,
        sql: include_str!("sql/cfsb_instances.sql"),
    },
    CatalogEntry {
        key: CatalogKey::CreateTableCfsbBindings,
        sql: include_str!("sql/cfsb_bindings.sql"),
    },
    CatalogEntry {
        key: CatalogKey::CreateTableCfsbCredentials,
        sql: include_str!("sql/cfsb_credentials.sql"),
    },
    CatalogEntry {
        key: CatalogKey::CreateTableCfsbProvisionSteps,
        sql: include_str!("sql/cfsb_provision_steps.sql"),
    },
    CatalogEntry {
        key: CatalogKey::CreateTableRdpgWatchNotifications,
        sql: include_str!("sql/rdpg_watch_notifications.sql"),
    },
    CatalogEntry {
        key: CatalogKey::InsertDefaultCfsbServices,
        sql: include_str!("sql/insert_default_services.sql"),
    },
    CatalogEntry {
        key: CatalogKey::InsertDefaultCfsbPlans,
        sql: include_str!("sql/insert_default_plans.sql"),
    },
    CatalogEntry {
        key: CatalogKey::PostgresSchemas,
        sql: include_str!("sql/postgres_schemas.sql"),
    },
    CatalogEntry {
        key: CatalogKey::CreateFunctionRdpgDisableDatabase,
        sql: include_str!("sql/rdpg_disable_database.sql"),
    },
];

/// Read-only mapping from [`CatalogKey`] to SQL text.
#[derive(Clone, Copy, Debug)]
pub struct SchemaCatalog {
    entries: &'static [CatalogEntry],
}

impl SchemaCatalog {
    pub const fn new(entries: &'static [CatalogEntry]) -> Self {
        Self { entries }
    }

    /// The catalog shipped with the agent.
    pub fn standard() -> Self {
        Self::new(STANDARD_ENTRIES)
    }

    pub fn get(&self, key: CatalogKey) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.sql)
    }

    pub fn entries(&self) -> &'static [CatalogEntry] {
        self.entries
    }

    /// Keys from `required` with no entry in this catalog.
    pub fn missing(&self, required: &[CatalogKey]) -> Vec<CatalogKey> {
        required
            .iter()
            .copied()
            .filter(|key| self.get(*key).is_none())
            .collect()
    }
}

impl Default for SchemaCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
