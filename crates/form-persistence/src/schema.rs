// Esquema Diesel del almacenamiento clave/valor.
diesel::table! {
    storage_entries (key) {
        key -> Text,
        value -> Text,
        updated_at_ts -> BigInt,
    }
}
