use thiserror::Error;

/// Errors that abort mod initialization. Each names the feature that could
/// not be set up; the init thread logs it and leaves the game untouched.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("Could not determine the running game. {0}")]
    GameDetection(#[from] GameDetectionError),
    #[error("Could not match instruction pattern for {0}.")]
    Pattern(&'static str),
    #[error("Could not locate the {0} singleton. {1}")]
    Singleton(&'static str, LookupError),
    #[error("Failed installing the {0} hook. {1}")]
    Hook(&'static str, String),
    #[error("The platform messaging interface is unavailable.")]
    Messaging,
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Singleton was not found.")]
    NotFound,
    #[error("Could not initialize the singleton map. {0}")]
    SingletonMapCreation(SingletonMapError),
}

#[derive(Clone, Debug, Error)]
pub enum SingletonMapError {
    #[error("Error parsing pattern.")]
    Pattern,
    #[error("Failed to locate section {0} - {1}.")]
    Section(String, SectionLookupError),
    #[error("Failed to parse singleton name.")]
    MalformedName,
}

#[derive(Clone, Debug, Error)]
pub enum SectionLookupError {
    #[error("Failed to locate game base.")]
    NoGameBase,
    #[error("Failed to locate game section.")]
    SectionNotFound,
}

#[derive(Debug, Error)]
pub enum GameDetectionError {
    #[error("Failed acquiring the game's module handle.")]
    NoMainModuleHandle,
    #[error("Failed acquiring PE resources.")]
    MissingPeResources,
    #[error("Failed acquiring PE version info.")]
    MissingPeVersionInfo,
    #[error("Failed acquiring PE language for strings.")]
    MissingPeStringsLanguage,
    #[error("Failed acquiring product name from PE header.")]
    MissingProductName,
    #[error("Did not recognize game for product name {0}.")]
    UnknownProductName(String),
    #[error("Failed to find the .text section.")]
    MissingTextSection,
}

/// Peer messaging failures. Sends are fire-and-forget; the periodic push
/// makes the next interval self-correcting.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("Send to peer {0} failed with result {1}.")]
    SendFailed(u64, i32),
    #[error("Messaging interface unavailable.")]
    Unavailable,
}
