//! Car command handlers

use std::path::PathBuf;

use anyhow::{bail, Result};

use garage_core::{Car, Store};

use super::{parse_json, read_json_file};
use crate::output::Output;

/// List all cars
pub fn list(store: &Store, output: &Output) -> Result<()> {
    let mut cars = store.cars().get_all()?;
    cars.sort_by(|a, b| a.id.cmp(&b.id));
    output.print_cars(&cars);
    Ok(())
}

/// Show one car
pub fn show(store: &Store, id: String, output: &Output) -> Result<()> {
    match store.cars().get(&id)? {
        Some(car) => {
            output.print_record(&car, &car.id);
            Ok(())
        }
        None => bail!("Car not found: {}", id),
    }
}

/// Insert or replace a car from a JSON object
pub fn put(store: &Store, json: String, output: &Output) -> Result<()> {
    let car: Car = parse_json(&json)?;
    store.cars().put(&car)?;
    output.success(&format!("Saved car {}", car.id));
    Ok(())
}

/// Insert or replace every car in a JSON array file, all or nothing
pub fn import(store: &Store, file: PathBuf, output: &Output) -> Result<()> {
    let cars: Vec<Car> = read_json_file(&file)?;
    let count = store.cars().bulk_put(&cars)?;
    output.success(&format!("Imported {} car(s)", count));
    Ok(())
}

/// Delete a car
pub fn delete(store: &Store, id: String, output: &Output) -> Result<()> {
    if store.cars().delete(&id)? {
        output.success(&format!("Deleted car {}", id));
    } else {
        output.message(&format!("No car with id {}", id));
    }
    Ok(())
}

/// Delete every car
pub fn clear(store: &Store, output: &Output) -> Result<()> {
    let removed = store.cars().clear()?;
    output.success(&format!("Removed {} car(s)", removed));
    Ok(())
}
