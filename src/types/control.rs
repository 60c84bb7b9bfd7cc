//! Control-plane command and response codecs.

use bytes::Bytes;

use super::{put_var_bytes, CodecError, CorrelationId, Cursor, Role, RouteId};

pub const ROUTE_TYPE: u8 = 16;
pub const UNROUTE_TYPE: u8 = 17;
pub const ROUTED_TYPE: u8 = 48;
pub const UNROUTED_TYPE: u8 = 49;
pub const ERROR_TYPE: u8 = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteCommand {
    pub correlation_id: CorrelationId,
    pub nukleus: String,
    pub role: Role,
    pub reference: i64,
    pub source_name: String,
    pub source_ref: i64,
    pub target_name: String,
    pub target_ref: i64,
    pub authorization: u64,
    pub extension: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnrouteCommand {
    pub correlation_id: CorrelationId,
    pub route_id: RouteId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Route(RouteCommand),
    Unroute(UnrouteCommand),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlResponse {
    Routed {
        correlation_id: CorrelationId,
        route_id: RouteId,
    },
    Unrouted {
        correlation_id: CorrelationId,
    },
    Error {
        correlation_id: CorrelationId,
    },
}

impl ControlCommand {
    pub fn correlation_id(&self) -> CorrelationId {
        match self {
            ControlCommand::Route(cmd) => cmd.correlation_id,
            ControlCommand::Unroute(cmd) => cmd.correlation_id,
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        match self {
            ControlCommand::Route(cmd) => {
                out.push(ROUTE_TYPE);
                out.extend_from_slice(&cmd.correlation_id.0.to_le_bytes());
                put_var_bytes(out, cmd.nukleus.as_bytes())?;
                out.push(cmd.role.to_wire());
                out.extend_from_slice(&cmd.reference.to_le_bytes());
                put_var_bytes(out, cmd.source_name.as_bytes())?;
                out.extend_from_slice(&cmd.source_ref.to_le_bytes());
                put_var_bytes(out, cmd.target_name.as_bytes())?;
                out.extend_from_slice(&cmd.target_ref.to_le_bytes());
                out.extend_from_slice(&cmd.authorization.to_le_bytes());
                put_var_bytes(out, &cmd.extension)?;
            }
            ControlCommand::Unroute(cmd) => {
                out.push(UNROUTE_TYPE);
                out.extend_from_slice(&cmd.correlation_id.0.to_le_bytes());
                out.extend_from_slice(&cmd.route_id.0.to_le_bytes());
            }
        }
        Ok(())
    }

    pub fn decode(raw: &[u8]) -> Result<Self, CodecError> {
        let mut cursor = Cursor::new(raw);
        let command_type = cursor.u8("command type")?;
        match command_type {
            ROUTE_TYPE => {
                let correlation_id = CorrelationId(cursor.u64("route correlation id")?);
                let nukleus = cursor.var_str("route nukleus")?.to_owned();
                let role = Role::from_wire(cursor.u8("route role")?)?;
                let reference = cursor.i64("route reference")?;
                let source_name = cursor.var_str("route source name")?.to_owned();
                let source_ref = cursor.i64("route source ref")?;
                let target_name = cursor.var_str("route target name")?.to_owned();
                let target_ref = cursor.i64("route target ref")?;
                let authorization = cursor.u64("route authorization")?;
                let extension = Bytes::copy_from_slice(cursor.var_bytes("route extension")?);
                Ok(ControlCommand::Route(RouteCommand {
                    correlation_id,
                    nukleus,
                    role,
                    reference,
                    source_name,
                    source_ref,
                    target_name,
                    target_ref,
                    authorization,
                    extension,
                }))
            }
            UNROUTE_TYPE => Ok(ControlCommand::Unroute(UnrouteCommand {
                correlation_id: CorrelationId(cursor.u64("unroute correlation id")?),
                route_id: RouteId(cursor.u64("unroute route id")?),
            })),
            got => Err(CodecError::UnknownFrameType { got }),
        }
    }
}

impl ControlResponse {
    pub fn correlation_id(&self) -> CorrelationId {
        match self {
            ControlResponse::Routed { correlation_id, .. } => *correlation_id,
            ControlResponse::Unrouted { correlation_id } => *correlation_id,
            ControlResponse::Error { correlation_id } => *correlation_id,
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            ControlResponse::Routed {
                correlation_id,
                route_id,
            } => {
                out.push(ROUTED_TYPE);
                out.extend_from_slice(&correlation_id.0.to_le_bytes());
                out.extend_from_slice(&route_id.0.to_le_bytes());
            }
            ControlResponse::Unrouted { correlation_id } => {
                out.push(UNROUTED_TYPE);
                out.extend_from_slice(&correlation_id.0.to_le_bytes());
            }
            ControlResponse::Error { correlation_id } => {
                out.push(ERROR_TYPE);
                out.extend_from_slice(&correlation_id.0.to_le_bytes());
            }
        }
    }

    pub fn decode(raw: &[u8]) -> Result<Self, CodecError> {
        let mut cursor = Cursor::new(raw);
        let response_type = cursor.u8("response type")?;
        let correlation_id = CorrelationId(cursor.u64("response correlation id")?);
        match response_type {
            ROUTED_TYPE => Ok(ControlResponse::Routed {
                correlation_id,
                route_id: RouteId(cursor.u64("routed route id")?),
            }),
            UNROUTED_TYPE => Ok(ControlResponse::Unrouted { correlation_id }),
            ERROR_TYPE => Ok(ControlResponse::Error { correlation_id }),
            got => Err(CodecError::UnknownFrameType { got }),
        }
    }
}
