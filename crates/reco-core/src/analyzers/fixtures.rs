//! A tiny static vehicle catalog shared by the reference analyzers. Stands
//! in for the database query layer, which is out of scope (SPEC_FULL.md
//! §1) — a real analyzer would query a fleet database here instead.

pub struct VehicleFixture {
    pub id: &'static str,
    pub brand: &'static str,
    pub year: i32,
    pub price: f64,
    pub mileage: f64,
    pub fuel_type: &'static str,
    pub transmission: &'static str,
    pub rating: f64,
    pub popularity: f64,
}

pub fn catalog() -> &'static [VehicleFixture] {
    &[
        VehicleFixture { id: "v1", brand: "Toyota", year: 2020, price: 18500.0, mileage: 32000.0, fuel_type: "gasoline", transmission: "automatic", rating: 0.86, popularity: 0.9 },
        VehicleFixture { id: "v2", brand: "Honda", year: 2019, price: 15800.0, mileage: 41000.0, fuel_type: "gasoline", transmission: "automatic", rating: 0.78, popularity: 0.8 },
        VehicleFixture { id: "v3", brand: "Hyundai", year: 2021, price: 21000.0, mileage: 18000.0, fuel_type: "gasoline", transmission: "automatic", rating: 0.81, popularity: 0.6 },
        VehicleFixture { id: "v4", brand: "Kia", year: 2018, price: 12900.0, mileage: 58000.0, fuel_type: "diesel", transmission: "manual", rating: 0.69, popularity: 0.5 },
        VehicleFixture { id: "v5", brand: "Toyota", year: 2022, price: 26500.0, mileage: 9000.0, fuel_type: "hybrid", transmission: "automatic", rating: 0.91, popularity: 0.95 },
        VehicleFixture { id: "v6", brand: "Ford", year: 2017, price: 11500.0, mileage: 72000.0, fuel_type: "gasoline", transmission: "manual", rating: 0.6, popularity: 0.4 },
        VehicleFixture { id: "v7", brand: "Chevrolet", year: 2020, price: 19900.0, mileage: 35000.0, fuel_type: "gasoline", transmission: "automatic", rating: 0.73, popularity: 0.55 },
        VehicleFixture { id: "v8", brand: "Honda", year: 2022, price: 23900.0, mileage: 12000.0, fuel_type: "hybrid", transmission: "automatic", rating: 0.88, popularity: 0.7 },
    ]
}
