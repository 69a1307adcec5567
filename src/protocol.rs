use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::types::{DeviceSnapshot, TemperatureScale, UserProfile};
use crate::{Error, Result};

pub const HOSTNAME_US: &str = "bke.us.airstagelight.com";
pub const HOSTNAME_EU: &str = "bke.euro.airstagelight.com";

pub const DEFAULT_OS_VERSION: &str = "17.1";
pub const DEFAULT_USER_AGENT: &str = "AirstageLight/2.3.0 (iPhone; iOS 17.1; Scale/3.00)";
pub const DEFAULT_DEVICE_SUB_ID: &str = "0";

pub const PATH_SIGN_IN: &str = "/apiv1/users/sign_in";
pub const PATH_REFRESH_TOKEN: &str = "/apiv1/users/me/refresh_token";
pub const PATH_USERS_ME: &str = "/apiv1/users/me";
pub const PATH_DEVICES_ALL: &str = "/apiv1/devices/all";

pub const PARAM_POWER: &str = "iu_onoff";
pub const PARAM_OPERATION_MODE: &str = "iu_op_mode";
pub const PARAM_FAN_SPEED: &str = "iu_fan_spd";
pub const PARAM_INDOOR_TEMPERATURE: &str = "iu_indoor_tmp";
pub const PARAM_OUTDOOR_TEMPERATURE: &str = "iu_outdoor_tmp";
pub const PARAM_TARGET_TEMPERATURE: &str = "iu_set_tmp";
pub const PARAM_VERTICAL_DIRECTION: &str = "iu_af_dir_vrt";
pub const PARAM_VERTICAL_SWING: &str = "iu_af_swg_vrt";
pub const PARAM_POWERFUL: &str = "iu_powerful";
pub const PARAM_ECONOMY: &str = "iu_economy";
pub const PARAM_ENERGY_SAVING_FAN: &str = "iu_fan_ctrl";
pub const PARAM_MINIMUM_HEAT: &str = "iu_min_heat";
pub const PARAM_MODEL: &str = "iu_model";

pub const USER_TEMP_UNIT: &str = "tempUnit";

pub const STATUS_COMPLETE: &str = "complete";
pub const RESULT_SUCCESS: &str = "success";

pub fn hostname(region: &str) -> Option<&'static str> {
    match region {
        "us" => Some(HOSTNAME_US),
        "eu" => Some(HOSTNAME_EU),
        _ => None,
    }
}

pub fn device_path(device_id: &str) -> String {
    format!("/apiv1/devices/{device_id}")
}

pub fn set_parameters_path(device_id: &str) -> String {
    format!("/apiv1/devices/{device_id}/set_parameters_request")
}

pub fn request_path(device_id: &str, request_id: &str) -> String {
    format!("/apiv1/devices/{device_id}/requests/{request_id}")
}

pub struct SignIn<'a> {
    pub country: &'a str,
    pub language: &'a str,
    pub os_version: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

pub fn sign_in_body(req: &SignIn<'_>) -> Value {
    json!({
        "user": {
            "country": req.country,
            "deviceToken": Uuid::new_v4().simple().to_string(),
            "email": req.email,
            "language": req.language,
            "osVersion": req.os_version,
            "password": req.password,
            "ssid": ""
        }
    })
}

pub fn refresh_token_body(refresh_token: &str) -> Value {
    json!({ "user": { "refreshToken": refresh_token } })
}

pub fn set_parameters_body(sub_id: &str, name: &str, value: &str) -> Value {
    json!({
        "deviceSubId": sub_id,
        "parameters": [{ "name": name, "desiredValue": value }]
    })
}

pub fn put_user_body(attribute: &str, value: &str) -> Value {
    json!({ "user": { attribute: value } })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
    pub refresh_token: Option<String>,
}

fn default_expires_in() -> i64 {
    3600
}

pub(crate) fn parse_token_response(body: Option<&Value>) -> Result<TokenResponse> {
    let body = body.ok_or_else(|| Error::Protocol("empty token response".into()))?;
    serde_json::from_value(body.clone())
        .map_err(|e| Error::Protocol(format!("malformed token response: {e}")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParameterEntry {
    name: String,
    value: Option<Value>,
    desired_value: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawRequestStatus {
    status: String,
    result: Option<String>,
    #[serde(default)]
    parameters: Vec<ParameterEntry>,
}

/// Status of an in-flight set-parameters request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestStatus {
    pub status: String,
    pub result: Option<String>,
    pub parameters: BTreeMap<String, String>,
}

impl RequestStatus {
    pub fn is_complete(&self) -> bool {
        self.status == STATUS_COMPLETE
    }

    pub fn is_success(&self) -> bool {
        self.result.as_deref() == Some(RESULT_SUCCESS)
    }
}

pub fn parse_request_status(body: Option<&Value>) -> Result<RequestStatus> {
    let body = body.ok_or_else(|| Error::Protocol("empty request status".into()))?;
    let raw: RawRequestStatus = serde_json::from_value(body.clone())
        .map_err(|e| Error::Protocol(format!("malformed request status: {e}")))?;
    let parameters = raw
        .parameters
        .into_iter()
        .filter_map(|p| {
            let value = p.value.or(p.desired_value)?;
            Some((p.name, scalar_to_string(&value)?))
        })
        .collect();
    Ok(RequestStatus {
        status: raw.status,
        result: raw.result,
        parameters,
    })
}

pub fn parse_request_id(body: Option<&Value>) -> Result<String> {
    body.and_then(|b| b.get("reqId"))
        .and_then(scalar_to_string)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::Protocol("set_parameters_request response missing reqId".into()))
}

/// The API returns most values as strings but occasionally as bare numbers.
fn scalar_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        _ => None,
    }
}

fn parse_parameters(data: &Value) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    if let Some(Value::Array(params)) = data.get("parameters") {
        for p in params {
            let name = match p.get("name").and_then(|v| v.as_str()) {
                Some(n) => n,
                None => continue,
            };
            if let Some(value) = p.get("value").and_then(scalar_to_string) {
                out.insert(name.to_string(), value);
            }
        }
    }
    out
}

/// Parse one device object. `fallback_id` is used when the payload omits
/// `deviceId`, as single-device responses sometimes do.
pub fn parse_device(data: &Value, fallback_id: Option<&str>) -> Option<DeviceSnapshot> {
    let device_id = data
        .get("deviceId")
        .and_then(scalar_to_string)
        .or_else(|| fallback_id.map(str::to_string))?;
    Some(DeviceSnapshot {
        device_id,
        name: data
            .get("deviceName")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        connection_status: data
            .get("connectionStatus")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        parameters: parse_parameters(data),
    })
}

pub fn parse_device_list(body: Option<&Value>) -> Result<Vec<DeviceSnapshot>> {
    let devices = match body.and_then(|b| b.get("devices")) {
        Some(Value::Array(devices)) => devices,
        _ => return Err(Error::Protocol("device list missing devices array".into())),
    };
    Ok(devices.iter().filter_map(|d| parse_device(d, None)).collect())
}

pub fn parse_user(body: Option<&Value>) -> Result<UserProfile> {
    let body = body.ok_or_else(|| Error::Protocol("empty user response".into()))?;
    // Some API versions wrap the profile in `user`, others return it bare.
    let user = match body.get("user") {
        Some(Value::Object(map)) => map.clone(),
        _ => match body {
            Value::Object(map) => map.clone(),
            _ => return Err(Error::Protocol("user response is not an object".into())),
        },
    };
    Ok(UserProfile {
        temperature_scale: user
            .get(USER_TEMP_UNIT)
            .and_then(|v| v.as_str())
            .and_then(TemperatureScale::from_vendor_str),
        email: user.get("email").and_then(|v| v.as_str()).map(str::to_string),
        attributes: user,
    })
}

/// Build a structured error from a non-2xx response.
pub fn api_error(status: u16, body: Option<&Value>) -> Error {
    let field = |name: &str| {
        body.and_then(|b| b.get(name))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };
    let code = field("code").or_else(|| field("error")).or_else(|| {
        body.and_then(|b| b.pointer("/errors/0/code"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    });
    let message = field("message")
        .or_else(|| field("error_description"))
        .or_else(|| {
            body.and_then(|b| b.pointer("/errors/0/message"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("HTTP {status}"));
    Error::Api {
        status,
        code,
        message,
    }
}

/// Replace credential fields anywhere in a JSON document.
pub fn redact(value: &Value) -> Value {
    const SENSITIVE: &[&str] = &["password", "accessToken", "refreshToken", "deviceToken"];
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                if SENSITIVE.contains(&k.as_str()) {
                    out.insert(k.clone(), Value::String("<redacted>".into()));
                } else {
                    out.insert(k.clone(), redact(v));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}
