#[derive(Debug, serde::Serialize)]
#[serde(transparent)]
pub(crate) struct ErrorCode {
    code: &'static str,
}

impl ErrorCode {
    #[cfg(test)]
    pub(crate) const fn as_str(&self) -> &'static str {
        self.code
    }

    pub(crate) const COMMAND_TIMEOUT: ErrorCode = ErrorCode {
        code: "command-timeout",
    };
    pub(crate) const COMMAND_ERROR: ErrorCode = ErrorCode {
        code: "command-error",
    };
    pub(crate) const COMMAND_FAILURE: ErrorCode = ErrorCode {
        code: "command-failure",
    };
    pub(crate) const COMMAND_NOT_FOUND: ErrorCode = ErrorCode {
        code: "command-not-found",
    };
    pub(crate) const COMMAND_PERMISSION_DENIED: ErrorCode = ErrorCode {
        code: "command-permission-denied",
    };
    pub(crate) const PROBE_OUTPUT: ErrorCode = ErrorCode {
        code: "probe-output",
    };
    pub(crate) const ASPECT_RATIO_UNAVAILABLE: ErrorCode = ErrorCode {
        code: "aspect-ratio-unavailable",
    };
    pub(crate) const INVALID_PATH: ErrorCode = ErrorCode {
        code: "invalid-path",
    };
    pub(crate) const OBJECT_REQUEST_ERROR: ErrorCode = ErrorCode {
        code: "object-request-error",
    };
    pub(crate) const OBJECT_NOT_FOUND: ErrorCode = ErrorCode {
        code: "object-not-found",
    };
    pub(crate) const FILE_IO_ERROR: ErrorCode = ErrorCode {
        code: "file-io-error",
    };
    pub(crate) const INVALID_OBJECT_KEY: ErrorCode = ErrorCode {
        code: "invalid-object-key",
    };
    pub(crate) const SIGNATURE_ERROR: ErrorCode = ErrorCode {
        code: "signature-error",
    };
    pub(crate) const INVALID_SIGNATURE: ErrorCode = ErrorCode {
        code: "invalid-signature",
    };
    pub(crate) const EXPIRED_SIGNATURE: ErrorCode = ErrorCode {
        code: "expired-signature",
    };
    pub(crate) const PANIC: ErrorCode = ErrorCode { code: "panic" };
    pub(crate) const SLED_ERROR: ErrorCode = ErrorCode { code: "sled-error" };
    pub(crate) const INVALID_PUBLIC_URL: ErrorCode = ErrorCode {
        code: "invalid-public-url",
    };
    pub(crate) const FILE_UPLOAD_ERROR: ErrorCode = ErrorCode {
        code: "file-upload-error",
    };
    pub(crate) const IO_ERROR: ErrorCode = ErrorCode { code: "io-error" };
    pub(crate) const VALIDATE_NO_FILES: ErrorCode = ErrorCode {
        code: "validate-no-files",
    };
    pub(crate) const VALIDATE_FILE_SIZE: ErrorCode = ErrorCode {
        code: "validate-file-size",
    };
    pub(crate) const VALIDATE_MEDIA_TYPE: ErrorCode = ErrorCode {
        code: "validate-media-type",
    };
    pub(crate) const INVALID_VIDEO_ID: ErrorCode = ErrorCode {
        code: "invalid-video-id",
    };
    pub(crate) const MISSING_TOKEN: ErrorCode = ErrorCode {
        code: "missing-token",
    };
    pub(crate) const INVALID_TOKEN: ErrorCode = ErrorCode {
        code: "invalid-token",
    };
    pub(crate) const TOKEN_ERROR: ErrorCode = ErrorCode {
        code: "token-error",
    };
    pub(crate) const NOT_OWNER: ErrorCode = ErrorCode { code: "not-owner" };
    pub(crate) const VIDEO_NOT_FOUND: ErrorCode = ErrorCode {
        code: "video-not-found",
    };
    pub(crate) const THUMBNAIL_NOT_FOUND: ErrorCode = ErrorCode {
        code: "thumbnail-not-found",
    };
    pub(crate) const ASSET_NOT_FOUND: ErrorCode = ErrorCode {
        code: "asset-not-found",
    };
    pub(crate) const UNKNOWN_ERROR: ErrorCode = ErrorCode {
        code: "unknown-error",
    };
}
