//! ISAPI response status codes.
//!
//! Devices expect a `ResponseStatus` body in reply to event notifications.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum StatusCode {
    Ok = 1,
    DeviceBusy = 2,
    DeviceError = 3,
    InvalidOperation = 4,
    InvalidMessageFormat = 5,
    InvalidMessageContent = 6,
    RebootRequired = 7,
}

impl StatusCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// `statusString` as sent by devices
    pub fn status_string(self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::DeviceBusy => "Device Busy",
            StatusCode::DeviceError => "Device Error",
            StatusCode::InvalidOperation => "Invalid Operation",
            StatusCode::InvalidMessageFormat => "Invalid XML/JSON Format",
            StatusCode::InvalidMessageContent => "Invalid XML/JSON Content",
            StatusCode::RebootRequired => "Reboot Required",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubStatus {
    pub name: &'static str,
    pub error_code: &'static str,
    pub description: &'static str,
}

const fn sub(name: &'static str, error_code: &'static str, description: &'static str) -> SubStatus {
    SubStatus {
        name,
        error_code,
        description,
    }
}

const OK: &[SubStatus] = &[
    sub("ok", "0x1", "Operation completed."),
    sub("riskPassword", "0x10000002", "Risky password."),
];

const DEVICE_BUSY: &[SubStatus] = &[
    sub("noMemory", "0x20000001", "Insufficient memory."),
    sub("upgrading", "0x20000003", "Upgrading."),
    sub("networkError", "0x20000009", "Network error."),
];

const DEVICE_ERROR: &[SubStatus] = &[
    sub("deviceError", "0x30000001", "Device hardware error."),
    sub("createSocketError", "0x30000004", "Creating socket failed."),
    sub("sendRequestError", "0x30000006", "Sending request failed."),
    sub("passwordDecodeError", "0x30000008", "Decrypting password failed."),
    sub("passwordEncryptError", "0x30000009", "Encrypting password failed."),
    sub("pictureUploadFailed", "0x3000000B", "Uploading picture failed."),
    sub("uninitialized", "0x3000000C", "Uninitialized."),
    sub("connectDatabaseError", "0x3000000E", "Connecting to database failed."),
    sub("internalError", "0x30000014", "Internal error."),
];

const INVALID_OPERATION: &[SubStatus] = &[
    sub("notSupport", "0x40000001", "Not supported."),
    sub("lowPrivilege", "0x40000002", "No permission."),
    sub("badAuthorization", "0x40000003", "Authentication failed."),
    sub("methodNotAllowed", "0x40000004", "Invalid HTTP method."),
    sub("notActivated", "0x40000007", "Inactivated."),
    sub("hasActivated", "0x40000008", "Activated."),
    sub("invalidContent", "0x4000000A", "Invalid message content."),
    sub("maxSessionUserLink", "0x4000000B", "No more user can log in."),
    sub("loginPasswordError", "0x4000000C", "Incorrect password."),
    sub(
        "MgmtLockedError",
        "0x4000000D",
        "Logging in management platform failed. IP is locked.",
    ),
];

const INVALID_MESSAGE_FORMAT: &[SubStatus] = &[
    sub("badJsonFormat", "0x50000002", "Invalid JSON format."),
    sub("badURLFormat", "0x50000003", "Invalid URL format."),
];

const INVALID_MESSAGE_CONTENT: &[SubStatus] = &[
    sub("badParameters", "0x60000001", "Incorrect parameter."),
    sub("badXmlContent", "0x60000003", "Incorrect XML message content."),
    sub("badPort", "0x6000000B", "Port number conflicted."),
    sub("portError", "0x6000000C", "Invalid port number."),
    sub("badVersion", "0x6000000F", "Version mismatches."),
    sub("requestMemoryNULL", "0x6000003F", "No memory is requested."),
    sub("tokenTimeout", "0x60000040", "The token timed out."),
    sub(
        "passwordLenNoMoreThan16",
        "0x6000005F",
        "Up to 16 characters are allowed in the password.",
    ),
    sub("eventCodeExist", "0x60000060", "The event code already exists."),
    sub("diskError", "0x60001009", "HDD error."),
];

const REBOOT_REQUIRED: &[SubStatus] = &[sub(
    "rebootRequired",
    "0x70000001",
    "Reboot device to take effect.",
)];

/// Sub-statuses defined for a status code
pub fn sub_statuses(status: StatusCode) -> &'static [SubStatus] {
    match status {
        StatusCode::Ok => OK,
        StatusCode::DeviceBusy => DEVICE_BUSY,
        StatusCode::DeviceError => DEVICE_ERROR,
        StatusCode::InvalidOperation => INVALID_OPERATION,
        StatusCode::InvalidMessageFormat => INVALID_MESSAGE_FORMAT,
        StatusCode::InvalidMessageContent => INVALID_MESSAGE_CONTENT,
        StatusCode::RebootRequired => REBOOT_REQUIRED,
    }
}

pub fn find_sub_status(status: StatusCode, sub_status_name: &str) -> Option<&'static SubStatus> {
    sub_statuses(status)
        .iter()
        .find(|s| s.name == sub_status_name)
}

/// Retrieve the description for a given status and sub-status
pub fn get_status_description(status: StatusCode, sub_status_name: &str) -> Option<&'static str> {
    find_sub_status(status, sub_status_name).map(|s| s.description)
}

/// ISAPI `ResponseStatus` body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseStatus {
    #[serde(rename = "requestURL")]
    pub request_url: String,
    pub status_code: i32,
    pub status_string: String,
    pub sub_status_code: String,
    pub error_code: i64,
    pub error_msg: String,
}

impl ResponseStatus {
    pub fn ok(request_url: impl Into<String>) -> Self {
        Self::error(request_url, StatusCode::Ok, "ok")
    }

    /// Build a status for `sub_status_name`; unknown names keep the name with
    /// error code 0 and an empty message
    pub fn error(request_url: impl Into<String>, status: StatusCode, sub_status_name: &str) -> Self {
        let found = find_sub_status(status, sub_status_name);
        Self {
            request_url: request_url.into(),
            status_code: status.code(),
            status_string: status.status_string().to_string(),
            sub_status_code: sub_status_name.to_string(),
            error_code: found.map(|s| parse_hex(s.error_code)).unwrap_or(0),
            error_msg: found.map(|s| s.description.to_string()).unwrap_or_default(),
        }
    }
}

fn parse_hex(code: &str) -> i64 {
    i64::from_str_radix(code.trim_start_matches("0x"), 16).unwrap_or(0)
}
