mod archive;
mod error;
mod item;
mod manifest;
mod tokens;
mod translate;

pub use archive::{open_payload, DirectoryPayload, PayloadArchive, PayloadKind, ZipPayload};
pub use error::{Error, ErrorCategory, IoContext, Result};
pub use item::{normalize_path, InstallerItem};
pub use manifest::{
    split_data_line, strip_quotes, Manifest, ManifestBinding, ManifestHeader, FIELD_SEPARATOR,
    HEADER_MARKER, UNKNOWN_VERSION, VERSION_KEY,
};
pub use tokens::{
    is_token, TokenTable, KNOWN_TOKENS, TOKEN_DARK_ICONS, TOKEN_LIGHT_ICONS, TOKEN_MACRO,
    TOKEN_MAIN, TOKEN_STARTUP,
};
pub use translate::{ManifestTranslator, SourcePolicy};
