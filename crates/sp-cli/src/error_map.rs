use sp_core::error::map_error;
use sp_core::PlaceholderError;

pub(crate) fn emit_error(error: PlaceholderError) -> i32 {
    println!("RESULT:ERROR");
    println!("ERROR_CODE:{}", error.code);
    println!(
        "ERROR_MSG_JSON:{}",
        serde_json::to_string(&error.message).expect("string json")
    );
    1
}

pub(crate) fn map_cli_data_folder(error: std::io::Error) -> PlaceholderError {
    map_error("CLI_DATA_FOLDER", error)
}

pub(crate) fn unknown_identifier(identifier: &str) -> PlaceholderError {
    PlaceholderError::new(
        "CLI_UNKNOWN_IDENTIFIER",
        format!("Invalid script identifier: {}", identifier),
    )
}
