//! Typed convenience wrappers over the record API.

use super::{GetAllOptions, Store, StoreResult};
use crate::model::domain::StoreRecord;
use crate::model::record::RecordKey;

impl Store {
    pub fn add_typed<T: StoreRecord>(&self, value: &T) -> StoreResult<RecordKey> {
        self.add(T::STORE, value.to_record()?)
    }

    pub fn update_typed<T: StoreRecord>(&self, value: &T) -> StoreResult<RecordKey> {
        self.update(T::STORE, value.to_record()?)
    }

    pub fn get_typed<T: StoreRecord>(&self, key: &RecordKey) -> StoreResult<Option<T>> {
        match self.get_by_id(T::STORE, key)? {
            Some(record) => Ok(Some(T::from_record(record)?)),
            None => Ok(None),
        }
    }

    pub fn get_all_typed<T: StoreRecord>(&self, options: &GetAllOptions) -> StoreResult<Vec<T>> {
        self.get_all(T::STORE, options)?
            .into_iter()
            .map(|record| T::from_record(record).map_err(Into::into))
            .collect()
    }
}
