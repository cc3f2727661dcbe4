use std::path::Path;
use serde::de::DeserializeOwned;
use serde::{Serialize};
use crate::utils::utils_errors::BinpickError;

/// Serialization seam for records that must survive across runs (most notably
/// the work-order record, which is rewritten after every successful placement).
/// The save type is kept separate from the live type so that runtime-only
/// fields never leak into the persisted JSON.
pub trait SaveAndLoadable {
    type SaveType: Serialize + DeserializeOwned;

    fn get_save_serialization_object(&self) -> Self::SaveType;
    fn get_serialization_string(&self) -> String {
        serde_json::to_string_pretty(&self.get_save_serialization_object()).expect("error")
    }
    fn save_to_path(&self, path: &Path) -> Result<(), BinpickError> {
        let s = self.get_serialization_string();
        return match std::fs::write(path, s) {
            Ok(_) => { Ok(()) }
            Err(e) => { Err(BinpickError::new_generic_error_str(&format!("could not write file {:?}: {}", path, e), file!(), line!())) }
        }
    }
    fn load_from_path(path: &Path) -> Result<Self, BinpickError> where Self: Sized {
        let s = match std::fs::read_to_string(path) {
            Ok(s) => { s }
            Err(e) => { return Err(BinpickError::new_generic_error_str(&format!("could not read file {:?}: {}", path, e), file!(), line!())); }
        };
        return Self::load_from_json_string(&s);
    }
    fn load_from_json_string(json_str: &str) -> Result<Self, BinpickError> where Self: Sized;
}

pub fn load_object_from_json_string<T: DeserializeOwned>(json_str: &str) -> Result<T, BinpickError> {
    let o: Result<T, _> = serde_json::from_str(json_str);
    return match o {
        Ok(o) => { Ok(o) }
        Err(e) => { Err(BinpickError::new_generic_error_str(&format!("could not load json string: {}", e), file!(), line!())) }
    }
}
