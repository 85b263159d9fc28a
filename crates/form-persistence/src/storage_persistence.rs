use crate::schema;
use crate::schema::storage_entries::dsl as entries_dsl;
use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::result::Error as DieselError;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use form_store::{KeyValueStorage, StoreError};
use log::{debug, warn};
use std::sync::Arc;
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");
type DbPool = Pool<ConnectionManager<SqliteConnection>>;
/// URL por defecto: SQLite en memoria compartida entre las conexiones del
/// pool. No sobrevive al proceso.
pub const DEFAULT_DATABASE_URL: &str = "file:formsdb?mode=memory&cache=shared";
/// `KeyValueStorage` duradero sobre SQLite.
pub struct DieselStorage {
  pool: Arc<DbPool>,
}
#[derive(Debug, Insertable)]
#[diesel(table_name = schema::storage_entries)]
struct EntryRow {
  key: String,
  value: String,
  updated_at_ts: i64,
}
fn map_db_err(e: DieselError) -> StoreError {
  StoreError::Storage(format!("db: {}", e))
}
impl DieselStorage {
  /// Abre (o crea) la base de datos en `database_url` y aplica las
  /// migraciones embebidas.
  pub fn new(database_url: &str) -> Result<Self, StoreError> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let pool = Pool::builder().max_size(4)
                              .build(manager)
                              .map_err(|e| StoreError::Storage(format!("no se pudo crear el pool de conexiones: {}", e)))?;
    let repo = DieselStorage { pool: Arc::new(pool) };
    let mut c = repo.conn()?;
    let _ = diesel::sql_query("PRAGMA journal_mode = WAL;").execute(&mut c);
    let _ = diesel::sql_query("PRAGMA busy_timeout = 5000;").execute(&mut c);
    c.run_pending_migrations(MIGRATIONS)
     .map_err(|e| StoreError::Storage(format!("migraciones: {}", e)))?;
    debug!("almacenamiento SQLite listo en {}", database_url);
    Ok(repo)
  }
  fn conn(&self) -> Result<PooledConnection<ConnectionManager<SqliteConnection>>, StoreError> {
    self.pool.get().map_err(|e| StoreError::Storage(format!("pool: {}", e)))
  }
}
impl KeyValueStorage for DieselStorage {
  fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
    let mut conn = self.conn()?;
    entries_dsl::storage_entries.filter(entries_dsl::key.eq(key))
                                .select(entries_dsl::value)
                                .first::<String>(&mut conn)
                                .optional()
                                .map_err(map_db_err)
  }
  fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
    let mut conn = self.conn()?;
    let row = EntryRow { key: key.to_string(), value: value.to_string(), updated_at_ts: Utc::now().timestamp_millis() };
    diesel::replace_into(entries_dsl::storage_entries).values(&row).execute(&mut conn).map_err(map_db_err)?;
    Ok(())
  }
  fn remove_item(&self, key: &str) -> Result<(), StoreError> {
    let mut conn = self.conn()?;
    diesel::delete(entries_dsl::storage_entries.filter(entries_dsl::key.eq(key))).execute(&mut conn)
                                                                                .map_err(map_db_err)?;
    Ok(())
  }
  fn keys(&self) -> Result<Vec<String>, StoreError> {
    let mut conn = self.conn()?;
    entries_dsl::storage_entries.select(entries_dsl::key)
                                .order(entries_dsl::key.asc())
                                .load::<String>(&mut conn)
                                .map_err(map_db_err)
  }
  fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
    // LIKE trata '_' y '%' como comodines: se filtra de nuevo en memoria
    let mut conn = self.conn()?;
    let pattern = format!("{}%", prefix.replace('%', ""));
    let keys = entries_dsl::storage_entries.select(entries_dsl::key)
                                           .filter(entries_dsl::key.like(pattern))
                                           .order(entries_dsl::key.asc())
                                           .load::<String>(&mut conn)
                                           .map_err(map_db_err)?;
    Ok(keys.into_iter().filter(|k| k.starts_with(prefix)).collect())
  }
}
/// Crea el almacenamiento desde las variables de entorno. Usa `FORM_DB_URL`
/// y `DATABASE_URL` como alternativa; sin ninguna, SQLite en memoria.
pub fn new_from_env() -> Result<DieselStorage, StoreError> {
  dotenvy::dotenv().ok();
  let url = std::env::var("FORM_DB_URL").or_else(|_| std::env::var("DATABASE_URL"))
                                        .unwrap_or_else(|_| DEFAULT_DATABASE_URL.into());
  let l = url.to_lowercase();
  if l.starts_with("postgres") || l.starts_with("mysql") {
    warn!("FORM_DB_URL apunta a un servidor; este almacenamiento sólo admite SQLite");
    return Err(StoreError::Storage("FORM_DB_URL / DATABASE_URL no es una URL SQLite".into()));
  }
  DieselStorage::new(&url)
}
