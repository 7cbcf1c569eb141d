//! Fake catalog database for bootstrap tests.
//!
//! Tracks which tables, routines and named rows exist per scope (`control` or
//! a node address) by reading the object names out of the statements it is
//! handed, the same names the lookups ask about.

use async_trait::async_trait;
use rdpg_core::Node;
use rdpg_metadata::{MetadataError, MetadataResult, SchemaConnector, SchemaSession};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

pub const CONTROL: &str = "control";

#[derive(Default)]
pub struct FakeDbState {
    tables: HashSet<(String, String)>,
    routines: HashSet<(String, String)>,
    /// `(scope, table, insert args)`.
    rows: Vec<(String, String, Vec<String>)>,
    /// `(scope, sql)` for every statement run, in order.
    pub statements: Vec<(String, String)>,
    failing_statements: Vec<String>,
    unreachable: HashSet<String>,
    failing_lookups: bool,
}

/// Connector handing out sessions over one shared fake state.
#[derive(Clone, Default)]
pub struct FakeConnector {
    state: Arc<Mutex<FakeDbState>>,
}

#[allow(dead_code)]
impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statements containing `needle` fail when executed.
    pub fn fail_statements_containing(&self, needle: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_statements
            .push(needle.to_string());
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failing_statements.clear();
    }

    /// Connecting to `scope` fails.
    pub fn make_unreachable(&self, scope: &str) {
        self.state.lock().unwrap().unreachable.insert(scope.to_string());
    }

    pub fn fail_lookups(&self) {
        self.state.lock().unwrap().failing_lookups = true;
    }

    pub fn has_table(&self, scope: &str, qualified: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .tables
            .contains(&(scope.to_string(), qualified.to_string()))
    }

    pub fn has_routine(&self, scope: &str, qualified: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .routines
            .contains(&(scope.to_string(), qualified.to_string()))
    }

    /// Names of the rows inserted into `qualified` in `scope`.
    pub fn rows(&self, scope: &str, qualified: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .rows
            .iter()
            .filter(|(s, t, _)| s == scope && t == qualified)
            .filter_map(|(_, _, args)| args.last().cloned())
            .collect()
    }

    /// Add a row as if inserted with `args`, the row name last.
    pub fn insert_row(&self, scope: &str, qualified: &str, args: &[&str]) {
        self.state.lock().unwrap().rows.push((
            scope.to_string(),
            qualified.to_string(),
            args.iter().map(|arg| arg.to_string()).collect(),
        ));
    }

    pub fn statement_count(&self, scope: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .statements
            .iter()
            .filter(|(s, _)| s == scope)
            .count()
    }

    pub fn statement_scopes(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .statements
            .iter()
            .map(|(scope, _)| scope.clone())
            .collect()
    }

    fn open(&self, scope: String) -> MetadataResult<Box<dyn SchemaSession>> {
        if self.state.lock().unwrap().unreachable.contains(&scope) {
            return Err(MetadataError::Internal(format!("{scope} unreachable")));
        }
        Ok(Box::new(FakeSession {
            scope,
            state: self.state.clone(),
        }))
    }
}

#[async_trait]
impl SchemaConnector for FakeConnector {
    async fn control(&self) -> MetadataResult<Box<dyn SchemaSession>> {
        self.open(CONTROL.to_string())
    }

    async fn node_admin(&self, node: &Node) -> MetadataResult<Box<dyn SchemaSession>> {
        self.open(node.to_string())
    }
}

struct FakeSession {
    scope: String,
    state: Arc<Mutex<FakeDbState>>,
}

/// The object name following `marker`, up to whitespace or `(`.
fn name_after<'a>(sql: &'a str, marker: &str) -> Option<&'a str> {
    let start = sql.find(marker)? + marker.len();
    sql[start..]
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .filter(|name| !name.is_empty())
}

impl FakeSession {
    /// Returns the number of rows inserted.
    fn run(&self, sql: &str, args: &[&str]) -> MetadataResult<u64> {
        let mut state = self.state.lock().unwrap();
        state.statements.push((self.scope.clone(), sql.to_string()));
        if state
            .failing_statements
            .iter()
            .any(|needle| sql.contains(needle.as_str()))
        {
            return Err(MetadataError::Internal("injected statement failure".to_string()));
        }

        for line in sql.lines() {
            if let Some(table) = name_after(line, "CREATE TABLE IF NOT EXISTS ") {
                state.tables.insert((self.scope.clone(), table.to_string()));
            }
            if let Some(routine) = name_after(line, "CREATE OR REPLACE FUNCTION ") {
                state
                    .routines
                    .insert((self.scope.clone(), routine.to_string()));
            }
        }
        let Some(table) = name_after(sql, "INSERT INTO ") else {
            return Ok(0);
        };
        let row = (
            self.scope.clone(),
            table.to_string(),
            args.iter().map(|arg| arg.to_string()).collect::<Vec<_>>(),
        );
        // A plan is inserted only under an existing service.
        let parent_missing = table == "cfsb.plans"
            && !state.rows.iter().any(|(s, t, a)| {
                *s == self.scope && t == "cfsb.services" && a.last() == row.2.first()
            });
        if parent_missing || state.rows.contains(&row) {
            return Ok(0);
        }
        state.rows.push(row);
        Ok(1)
    }

    fn lookup_guard(&self) -> MetadataResult<()> {
        if self.state.lock().unwrap().failing_lookups {
            return Err(MetadataError::Internal("injected lookup failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SchemaSession for FakeSession {
    async fn execute(&mut self, sql: &str) -> MetadataResult<()> {
        self.run(sql, &[]).map(|_| ())
    }

    async fn execute_with(&mut self, sql: &str, args: &[&str]) -> MetadataResult<u64> {
        self.run(sql, args)
    }

    async fn table_exists(&mut self, schema: &str, table: &str) -> MetadataResult<bool> {
        self.lookup_guard()?;
        let key = (self.scope.clone(), format!("{schema}.{table}"));
        Ok(self.state.lock().unwrap().tables.contains(&key))
    }

    async fn routine_exists(&mut self, schema: &str, name: &str) -> MetadataResult<bool> {
        self.lookup_guard()?;
        let key = (self.scope.clone(), format!("{schema}.{name}"));
        Ok(self.state.lock().unwrap().routines.contains(&key))
    }

    async fn named_row_exists(
        &mut self,
        schema: &str,
        table: &str,
        name: &str,
    ) -> MetadataResult<bool> {
        self.lookup_guard()?;
        let qualified = format!("{schema}.{table}");
        Ok(self
            .state
            .lock()
            .unwrap()
            .rows
            .iter()
            .any(|(s, t, args)| {
                *s == self.scope && *t == qualified && args.last().map(String::as_str) == Some(name)
            }))
    }

    async fn service_plan_exists(&mut self, service: &str, plan: &str) -> MetadataResult<bool> {
        self.lookup_guard()?;
        Ok(self.state.lock().unwrap().rows.iter().any(|(s, t, args)| {
            *s == self.scope && t == "cfsb.plans" && args.as_slice() == [service, plan]
        }))
    }

    async fn close(self: Box<Self>) -> MetadataResult<()> {
        Ok(())
    }
}
