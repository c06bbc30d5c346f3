//! Composition root wiring the store and the domain services.

use std::fs;
use std::sync::Arc;

use tracing::info;

use stockbook_core::IdGenerator;
use stockbook_inventory::{InventoryLedger, LedgerConfig};
use stockbook_invoicing::InvoiceProcessor;
use stockbook_parties::PartyDirectory;
use stockbook_products::ProductCatalog;
use stockbook_store::{MemoryBackend, RedbBackend, SchemaManager, Store, StoreBackend, StoreError};

use crate::config::PosConfig;
use crate::schema::schema_versions;

const DATABASE_FILE: &str = "stockbook.redb";

/// A fully wired point-of-sale system.
///
/// Opening a `Pos` runs schema migrations before handing anything out, so a
/// live handle always sees the latest schema version.
#[derive(Debug, Clone)]
pub struct Pos {
    store: Arc<Store>,
    catalog: ProductCatalog,
    parties: PartyDirectory,
    ledger: InventoryLedger,
    invoices: InvoiceProcessor,
}

impl Pos {
    /// Open the store described by `config` and wire every service over it.
    pub fn open(config: &PosConfig) -> Result<Self, StoreError> {
        let backend: Box<dyn StoreBackend> = match &config.data_dir {
            Some(dir) => {
                fs::create_dir_all(dir).map_err(StoreError::backend)?;
                Box::new(RedbBackend::open(dir.join(DATABASE_FILE))?)
            }
            None => Box::new(MemoryBackend::new()),
        };
        let schema = SchemaManager::new(schema_versions())?;
        let store = Arc::new(Store::open(backend, schema)?);
        let ids = Arc::new(IdGenerator::new());

        let catalog = ProductCatalog::new(Arc::clone(&store), Arc::clone(&ids));
        let parties = PartyDirectory::new(Arc::clone(&store), Arc::clone(&ids));
        let ledger = InventoryLedger::new(
            Arc::clone(&store),
            Arc::clone(&ids),
            LedgerConfig {
                allow_negative_stock: config.allow_negative_stock,
            },
        );
        let invoices = InvoiceProcessor::new(Arc::clone(&store), Arc::clone(&ids), ledger.clone());

        info!(
            durable = config.data_dir.is_some(),
            allow_negative_stock = config.allow_negative_stock,
            "point of sale opened"
        );
        Ok(Self {
            store,
            catalog,
            parties,
            ledger,
            invoices,
        })
    }

    pub fn catalog(&self) -> &ProductCatalog {
        &self.catalog
    }

    pub fn parties(&self) -> &PartyDirectory {
        &self.parties
    }

    pub fn ledger(&self) -> &InventoryLedger {
        &self.ledger
    }

    pub fn invoices(&self) -> &InvoiceProcessor {
        &self.invoices
    }

    /// Direct store access, for ad-hoc queries and tooling.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }
}
