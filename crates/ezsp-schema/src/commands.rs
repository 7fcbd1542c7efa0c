//! The static EZSP command table.
//!
//! One entry per frame: request fields (host to NCP), response fields
//! (NCP to host) and an optional protocol version range. Callbacks have
//! an empty request. An id may appear more than once when the entries'
//! version ranges do not overlap.

use bytes::BufMut;
use serde_json::Value as Json;

use crate::error::{Result, SchemaError};
use crate::types::{
    decode_fields, encode_fields, Field, FieldType, APS_FRAME, BOOL, COUNTERS,
    CURRENT_SECURITY_STATE, EUI64, I8, INITIAL_SECURITY_STATE, NETWORK_PARAMETERS, NODE_ID,
    PAN_ID, TOKEN_DATA, U16, U32, U8, ZIGBEE_NETWORK,
};
use crate::value::{Record, Value};

/// Schema of one EZSP frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSchema {
    pub name: &'static str,
    pub id: u16,
    pub request: &'static [Field],
    pub response: &'static [Field],
    /// Sent by the NCP on its own; never executed by the host.
    pub callback: bool,
    /// Lowest protocol version the entry applies to.
    pub min_version: Option<u8>,
    /// Highest protocol version the entry applies to.
    pub max_version: Option<u8>,
}

impl CommandSchema {
    const BLANK: CommandSchema = CommandSchema {
        name: "",
        id: 0,
        request: &[],
        response: &[],
        callback: false,
        min_version: None,
        max_version: None,
    };

    pub fn applies_to(&self, version: u8) -> bool {
        self.min_version.is_none_or(|min| version >= min)
            && self.max_version.is_none_or(|max| version <= max)
    }

    /// Callbacks are frames the NCP sends without a matching command.
    pub fn is_callback(&self) -> bool {
        self.callback
    }

    pub(crate) fn overlaps(&self, other: &CommandSchema) -> bool {
        let lo = self.min_version.unwrap_or(0).max(other.min_version.unwrap_or(0));
        let hi = self
            .max_version
            .unwrap_or(u8::MAX)
            .min(other.max_version.unwrap_or(u8::MAX));
        lo <= hi
    }

    /// Serialize named request arguments.
    pub fn encode_request<B: BufMut>(&self, args: &Record, out: &mut B) -> Result<()> {
        encode_fields(self.request, args, out)
    }

    /// Serialize positional request arguments.
    pub fn encode_request_values<B: BufMut>(&self, values: &[Value], out: &mut B) -> Result<()> {
        let args = Record::from_values(self.request, values).ok_or(SchemaError::ArgumentCount {
            command: self.name,
            expected: self.request.len(),
            actual: values.len(),
        })?;
        self.encode_request(&args, out)
    }

    /// Build request arguments from a JSON object.
    pub fn request_from_json(&self, json: &Json) -> Result<Record> {
        Record::from_json(self.request, json)
    }

    /// Decode a response body. Bytes past the last field are ignored.
    pub fn decode_response(&self, mut body: &[u8]) -> Result<Record> {
        decode_fields(self.response, &mut body)
    }

    /// Decode a request body, as captured on its way to the NCP.
    pub fn decode_request(&self, mut body: &[u8]) -> Result<Record> {
        decode_fields(self.request, &mut body)
    }
}

macro_rules! fields {
    () => { &[] };
    ($($name:literal: $ty:expr),+ $(,)?) => {
        &[$(Field { name: $name, ty: &$ty }),+]
    };
}

macro_rules! command {
    ($name:literal = $id:literal, [$($req:tt)*] => [$($res:tt)*] $(, $bound:ident = $v:literal)*) => {
        CommandSchema {
            name: $name,
            id: $id,
            request: fields!($($req)*),
            response: fields!($($res)*),
            $($bound: Some($v),)*
            ..CommandSchema::BLANK
        }
    };
}

macro_rules! callback {
    ($name:literal = $id:literal => [$($res:tt)*] $(, $bound:ident = $v:literal)*) => {
        CommandSchema {
            name: $name,
            id: $id,
            response: fields!($($res)*),
            callback: true,
            $($bound: Some($v),)*
            ..CommandSchema::BLANK
        }
    };
}

pub const VERSION: u16 = 0x0000;
pub const INVALID_COMMAND: u16 = 0x0058;

pub static COMMANDS: &[CommandSchema] = &[
    // Configuration
    command!("version" = 0x0000, ["desiredProtocolVersion": U8]
        => ["protocolVersion": U8, "stackType": U8, "stackVersion": U16]),
    command!("getConfigurationValue" = 0x0052, ["configId": U8] => ["status": U8, "value": U16]),
    command!("setConfigurationValue" = 0x0053, ["configId": U8, "value": U16] => ["status": U8]),
    command!("addEndpoint" = 0x0002, [
        "endpoint": U8,
        "profileId": U16,
        "deviceId": U16,
        "appFlags": U8,
        "inputClusterCount": U8,
        "outputClusterCount": U8,
        "inputClusterList": FieldType::WordList,
        "outputClusterList": FieldType::WordList,
    ] => ["status": U8]),
    command!("setPolicy" = 0x0055, ["policyId": U8, "decisionId": U8] => ["status": U8]),
    command!("getPolicy" = 0x0056, ["policyId": U8] => ["status": U8, "decisionId": U8]),
    command!("sendPanIdUpdate" = 0x0057, ["newPan": PAN_ID] => ["status": BOOL]),
    command!("getValue" = 0x00AA, ["valueId": U8] => ["status": U8, "value": FieldType::LvBytes]),
    command!("getExtendedValue" = 0x0003, ["valueId": U8, "characteristics": U32]
        => ["status": U8, "value": FieldType::LvBytes]),
    command!("setValue" = 0x00AB, ["valueId": U8, "value": FieldType::LvBytes] => ["status": U8]),
    // Utilities
    command!("nop" = 0x0005, [] => []),
    command!("echo" = 0x0081, ["data": FieldType::LvBytes] => ["echo": FieldType::LvBytes]),
    command!("invalidCommand" = 0x0058, [] => ["reason": U8]),
    command!("callback" = 0x0006, [] => []),
    command!("noCallbacks" = 0x0007, [] => []),
    command!("setToken" = 0x0009, ["tokenId": U8, "tokenData": TOKEN_DATA] => ["status": U8]),
    command!("getToken" = 0x000A, ["tokenId": U8] => ["status": U8, "tokenData": TOKEN_DATA]),
    command!("getMfgToken" = 0x000B, ["tokenId": U8]
        => ["status": U8, "tokenData": FieldType::LvBytes]),
    command!("setMfgToken" = 0x000C, ["tokenId": U8, "tokenData": FieldType::LvBytes]
        => ["status": U8]),
    callback!("stackTokenChangedHandler" = 0x000D => ["tokenAddress": U16]),
    command!("getRandomNumber" = 0x0049, [] => ["status": U8, "value": U16]),
    command!("setTimer" = 0x000E, ["timerId": U8, "time": U16, "units": U8, "repeat": BOOL]
        => ["status": U8]),
    command!("getTimer" = 0x004E, ["timerId": U8] => ["time": U16, "units": U8, "repeat": BOOL]),
    callback!("timerHandler" = 0x000F => ["timerId": U8]),
    command!("debugWrite" = 0x0012, ["binaryMessage": BOOL, "message": FieldType::LvBytes]
        => ["status": U8]),
    command!("readAndClearCounters" = 0x0065, [] => ["values": COUNTERS]),
    command!("readCounters" = 0x00F1, [] => ["values": COUNTERS]),
    callback!("counterRolloverHandler" = 0x00F2 => ["type": U8]),
    command!("delayTest" = 0x009D, ["delay": U16] => []),
    command!("getLibraryStatus" = 0x0001, ["libraryId": U8] => ["status": U8]),
    command!("getXncpInfo" = 0x0013, [] => ["status": U8, "manufacturerId": U16, "versionNumber": U16]),
    command!("customFrame" = 0x0047, ["payload": FieldType::LvBytes]
        => ["status": U8, "reply": FieldType::LvBytes]),
    callback!("customFrameHandler" = 0x0054 => ["payload": FieldType::LvBytes]),
    command!("getEui64" = 0x0026, [] => ["eui64": EUI64]),
    command!("getNodeId" = 0x0027, [] => ["nodeId": NODE_ID]),
    command!("setManufacturerCode" = 0x0015, ["code": U16] => []),
    command!("setPowerDescriptor" = 0x0016, ["descriptor": U16] => []),
    command!("getStandaloneBootloaderVersionPlatMicroPhy" = 0x0091, []
        => ["bootloader_version": U16, "nodePlat": U8, "nodeMicro": U8, "nodePhy": U8]),
    // Networking
    command!("setConcentrator" = 0x0010, [
        "on": BOOL,
        "concentratorType": U16,
        "minTime": U16,
        "maxTime": U16,
        "routeErrorThreshold": U8,
        "deliveryFailureThreshold": U8,
        "maxHops": U8,
    ] => ["status": U8]),
    command!("setSourceRouteDiscoveryMode" = 0x005A, ["mode": U8] => ["remainingTime": U32]),
    command!("networkInit" = 0x0017, [] => ["status": U8]),
    command!("networkState" = 0x0018, [] => ["status": U8]),
    callback!("stackStatusHandler" = 0x0019 => ["status": U8]),
    command!("startScan" = 0x001A, ["scanType": U8, "channelMask": U32, "duration": U8]
        => ["status": U8]),
    callback!("energyScanResultHandler" = 0x0048 => ["channel": U8, "maxRssiValue": I8]),
    callback!("networkFoundHandler" = 0x001B
        => ["networkFound": ZIGBEE_NETWORK, "lastHopLqi": U8, "lastHopRssi": I8]),
    callback!("scanCompleteHandler" = 0x001C => ["channel": U8, "status": U8]),
    command!("formNetwork" = 0x001E, ["parameters": NETWORK_PARAMETERS] => ["status": U8]),
    command!("leaveNetwork" = 0x0020, [] => ["status": U8]),
    command!("permitJoining" = 0x0022, ["duration": U8] => ["status": U8]),
    callback!("childJoinHandler" = 0x0023 => [
        "index": U8,
        "joining": BOOL,
        "childId": NODE_ID,
        "childEui64": EUI64,
        "childType": U8,
    ]),
    command!("getNetworkParameters" = 0x0028, []
        => ["status": U8, "nodeType": U8, "parameters": NETWORK_PARAMETERS]),
    command!("getParentChildParameters" = 0x0029, []
        => ["childCount": U8, "parentEui64": EUI64, "parentNodeId": NODE_ID]),
    command!("getChildData" = 0x004A, ["index": U8]
        => ["status": U8, "nodeId": NODE_ID, "eui64": EUI64, "nodeType": U8]),
    command!("neighborCount" = 0x007A, [] => ["value": U8]),
    command!("setRadioPower" = 0x0099, ["power": I8] => ["status": U8]),
    command!("setRadioChannel" = 0x009A, ["channel": U8] => ["status": U8]),
    command!("lookupNodeIdByEui64" = 0x0060, ["eui64": EUI64] => ["nodeId": NODE_ID]),
    command!("lookupEui64ByNodeId" = 0x0061, ["nodeId": NODE_ID] => ["status": U8, "eui64": EUI64]),
    command!("setExtendedTimeout" = 0x007E, ["remoteEui64": EUI64, "extendedTimeout": BOOL] => []),
    command!("getExtendedTimeout" = 0x007F, ["remoteEui64": EUI64] => ["extendedTimeout": BOOL]),
    callback!("incomingRouteErrorHandler" = 0x0080 => ["status": U8, "target": NODE_ID]),
    callback!("changeSourceRouteHandler" = 0x00C4
        => ["newChildId": NODE_ID, "newParentId": NODE_ID], max_version = 8),
    callback!("incomingNetworkStatusHandler" = 0x00C4
        => ["errorCode": U8, "target": NODE_ID], min_version = 9),
    // Messaging
    command!("sendUnicast" = 0x0034, [
        "type": U8,
        "indexOrDestination": NODE_ID,
        "apsFrame": APS_FRAME,
        "messageTag": U8,
        "message": FieldType::LvBytes,
    ] => ["status": U8, "sequence": U8]),
    command!("sendBroadcast" = 0x0036, [
        "destination": NODE_ID,
        "apsFrame": APS_FRAME,
        "radius": U8,
        "messageTag": U8,
        "message": FieldType::LvBytes,
    ] => ["status": U8, "sequence": U8]),
    command!("sendMulticast" = 0x0038, [
        "apsFrame": APS_FRAME,
        "hops": U8,
        "nonmemberRadius": U8,
        "messageTag": U8,
        "message": FieldType::LvBytes,
    ] => ["status": U8, "sequence": U8]),
    callback!("messageSentHandler" = 0x003F => [
        "type": U8,
        "indexOrDestination": NODE_ID,
        "apsFrame": APS_FRAME,
        "messageTag": U8,
        "status": U8,
        "message": FieldType::LvBytes,
    ]),
    callback!("incomingMessageHandler" = 0x0045 => [
        "type": U8,
        "apsFrame": APS_FRAME,
        "lastHopLqi": U8,
        "lastHopRssi": I8,
        "sender": NODE_ID,
        "bindingIndex": U8,
        "addressIndex": U8,
        "message": FieldType::LvBytes,
    ]),
    // Security
    command!("setInitialSecurityState" = 0x0068, ["state": INITIAL_SECURITY_STATE]
        => ["success": U8]),
    command!("getCurrentSecurityState" = 0x0069, []
        => ["status": U8, "state": CURRENT_SECURITY_STATE]),
    command!("clearKeyTable" = 0x00B1, [] => ["status": U8]),
    callback!("trustCenterJoinHandler" = 0x0024 => [
        "newNodeId": NODE_ID,
        "newNodeEui64": EUI64,
        "status": U8,
        "policyDecision": U8,
        "parentOfNewNodeId": NODE_ID,
    ]),
];
