#![allow(dead_code)]

pub mod flaky_store;

use docmodel::{Field, FieldType, Model, Odm, OdmConfig, Schema};

pub use flaky_store::{FlakyStore, Op};

/// The Customer / Store / Product models over a shared [`FlakyStore`].
pub struct Shop {
    pub odm: Odm,
    pub store: FlakyStore,
    pub customers: Model,
    pub stores: Model,
    pub products: Model,
}

impl Shop {
    pub fn new() -> Self {
        Self::with_config(OdmConfig::default())
    }

    pub fn with_config(config: OdmConfig) -> Self {
        let store = FlakyStore::new();
        let odm = Odm::builder(store.clone()).config(config).build();

        let customers = odm
            .model(
                Schema::builder("Customer")
                    .field(Field::new("name", FieldType::String).required())
                    .field(Field::new("email", FieldType::String))
                    .field(Field::new("joined", FieldType::Date))
                    .field(Field::new(
                        "address",
                        FieldType::group(vec![
                            Field::new("street", FieldType::String),
                            Field::new("city", FieldType::String),
                            Field::new("country", FieldType::String).default_value("NZ"),
                        ]),
                    ))
                    .field(Field::new("notes", FieldType::Mixed)),
            )
            .unwrap();

        let stores = odm
            .model(
                Schema::builder("Store")
                    .field(Field::new("name", FieldType::String).required())
                    .field(Field::new(
                        "customers",
                        FieldType::list(FieldType::reference("Customer")),
                    )),
            )
            .unwrap();

        let products = odm
            .model(
                Schema::builder("Product")
                    .field(Field::new("name", FieldType::String).required())
                    .field(Field::new("sku", FieldType::String))
                    .field(Field::new("price", FieldType::Number))
                    .field(Field::new("store", FieldType::reference("Store")))
                    .ref_index(["store"])
                    .ref_index(["sku"])
                    .ref_index(["name", "store"]),
            )
            .unwrap();

        Shop {
            odm,
            store,
            customers,
            stores,
            products,
        }
    }
}
