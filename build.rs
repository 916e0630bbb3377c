fn main() {
    // Only the Tauri shell needs the generated context; the library builds without it.
    #[cfg(feature = "app")]
    tauri_build::build()
}
