//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

// Protocol buffer messages exchanged between the management daemon and its
// backend clients.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct YangDataValue {
    #[prost(oneof = "yang_data_value::Value", tags = "100")]
    pub value: Option<yang_data_value::Value>,
}

pub mod yang_data_value {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        #[prost(string, tag = "100")]
        EncodedStrVal(String),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct YangData {
    #[prost(string, tag = "1")]
    pub xpath: String,
    #[prost(message, optional, tag = "2")]
    pub value: Option<YangDataValue>,
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(::prost::Enumeration)]
#[repr(i32)]
pub enum CfgDataReqType {
    ReqTypeNone = 0,
    SetData = 1,
    DeleteData = 2,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct YangCfgDataReq {
    #[prost(message, optional, tag = "1")]
    pub data: Option<YangData>,
    #[prost(enumeration = "CfgDataReqType", tag = "2")]
    pub req_type: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct YangGetDataReq {
    #[prost(message, optional, tag = "1")]
    pub data: Option<YangData>,
    #[prost(int64, tag = "2")]
    pub next_indx: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct YangDataReply {
    #[prost(message, repeated, tag = "1")]
    pub data: Vec<YangData>,
    #[prost(int64, tag = "2")]
    pub next_indx: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BeSubscribeReq {
    #[prost(string, tag = "1")]
    pub client_name: String,
    #[prost(bool, tag = "2")]
    pub subscribe_xpaths: bool,
    #[prost(string, repeated, tag = "3")]
    pub xpath_reg: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BeSubscribeReply {
    #[prost(bool, tag = "1")]
    pub success: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BeTxnReq {
    #[prost(uint64, tag = "1")]
    pub txn_id: u64,
    #[prost(bool, tag = "2")]
    pub create: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BeTxnReply {
    #[prost(uint64, tag = "1")]
    pub txn_id: u64,
    #[prost(bool, tag = "2")]
    pub create: bool,
    #[prost(bool, tag = "3")]
    pub success: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BeCfgDataCreateReq {
    #[prost(uint64, tag = "1")]
    pub txn_id: u64,
    #[prost(uint64, tag = "2")]
    pub batch_id: u64,
    #[prost(message, repeated, tag = "3")]
    pub data_req: Vec<YangCfgDataReq>,
    #[prost(bool, tag = "4")]
    pub end_of_data: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BeCfgDataCreateReply {
    #[prost(uint64, tag = "1")]
    pub txn_id: u64,
    #[prost(uint64, tag = "2")]
    pub batch_id: u64,
    #[prost(bool, tag = "3")]
    pub success: bool,
    #[prost(string, optional, tag = "4")]
    pub error_if_any: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BeCfgDataApplyReq {
    #[prost(uint64, tag = "1")]
    pub txn_id: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BeCfgDataApplyReply {
    #[prost(uint64, tag = "1")]
    pub txn_id: u64,
    #[prost(uint64, repeated, tag = "2")]
    pub batch_ids: Vec<u64>,
    #[prost(bool, tag = "3")]
    pub success: bool,
    #[prost(string, optional, tag = "4")]
    pub error_if_any: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BeOperDataGetReq {
    #[prost(uint64, tag = "1")]
    pub txn_id: u64,
    #[prost(uint64, tag = "2")]
    pub batch_id: u64,
    #[prost(message, repeated, tag = "3")]
    pub data: Vec<YangGetDataReq>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BeOperDataGetReply {
    #[prost(uint64, tag = "1")]
    pub txn_id: u64,
    #[prost(uint64, tag = "2")]
    pub batch_id: u64,
    #[prost(bool, tag = "3")]
    pub success: bool,
    #[prost(string, optional, tag = "4")]
    pub error: Option<String>,
    #[prost(message, optional, tag = "5")]
    pub data: Option<YangDataReply>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BeOperDataNotify {
    #[prost(message, optional, tag = "5")]
    pub data: Option<YangDataReply>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BeConfigCmdReq {
    #[prost(string, tag = "1")]
    pub cmd: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BeConfigCmdReply {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(string, tag = "2")]
    pub error_if_any: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BeShowCmdReq {
    #[prost(string, tag = "1")]
    pub cmd: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BeShowCmdReply {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(string, tag = "2")]
    pub cmd_ouput: String,
}

// Top-level backend message.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BeMessage {
    #[prost(
        oneof = "be_message::Message",
        tags = "2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16"
    )]
    pub message: Option<be_message::Message>,
}

pub mod be_message {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Message {
        #[prost(message, tag = "2")]
        SubscrReq(super::BeSubscribeReq),
        #[prost(message, tag = "3")]
        SubscrReply(super::BeSubscribeReply),
        #[prost(message, tag = "4")]
        TxnReq(super::BeTxnReq),
        #[prost(message, tag = "5")]
        TxnReply(super::BeTxnReply),
        #[prost(message, tag = "6")]
        CfgDataReq(super::BeCfgDataCreateReq),
        #[prost(message, tag = "7")]
        CfgDataReply(super::BeCfgDataCreateReply),
        #[prost(message, tag = "8")]
        CfgApplyReq(super::BeCfgDataApplyReq),
        #[prost(message, tag = "9")]
        CfgApplyReply(super::BeCfgDataApplyReply),
        #[prost(message, tag = "10")]
        GetReq(super::BeOperDataGetReq),
        #[prost(message, tag = "11")]
        GetReply(super::BeOperDataGetReply),
        #[prost(message, tag = "12")]
        NotifyData(super::BeOperDataNotify),
        #[prost(message, tag = "13")]
        CfgCmdReq(super::BeConfigCmdReq),
        #[prost(message, tag = "14")]
        CfgCmdReply(super::BeConfigCmdReply),
        #[prost(message, tag = "15")]
        ShowCmdReq(super::BeShowCmdReq),
        #[prost(message, tag = "16")]
        ShowCmdReply(super::BeShowCmdReply),
    }
}

// ===== impl BeMessage =====

impl BeMessage {
    // Returns a short name for the message kind, used for logging.
    pub fn kind(&self) -> &'static str {
        use be_message::Message;

        match &self.message {
            Some(Message::SubscrReq(_)) => "SUBSCR_REQ",
            Some(Message::SubscrReply(_)) => "SUBSCR_REPLY",
            Some(Message::TxnReq(_)) => "TXN_REQ",
            Some(Message::TxnReply(_)) => "TXN_REPLY",
            Some(Message::CfgDataReq(_)) => "CFGDATA_CREATE_REQ",
            Some(Message::CfgDataReply(_)) => "CFGDATA_CREATE_REPLY",
            Some(Message::CfgApplyReq(_)) => "CFG_APPLY_REQ",
            Some(Message::CfgApplyReply(_)) => "CFG_APPLY_REPLY",
            Some(Message::GetReq(_)) => "GET_REQ",
            Some(Message::GetReply(_)) => "GET_REPLY",
            Some(Message::NotifyData(_)) => "NOTIFY_DATA",
            Some(Message::CfgCmdReq(_)) => "CFG_CMD_REQ",
            Some(Message::CfgCmdReply(_)) => "CFG_CMD_REPLY",
            Some(Message::ShowCmdReq(_)) => "SHOW_CMD_REQ",
            Some(Message::ShowCmdReply(_)) => "SHOW_CMD_REPLY",
            None => "NOT_SET",
        }
    }
}

impl From<be_message::Message> for BeMessage {
    fn from(message: be_message::Message) -> BeMessage {
        BeMessage {
            message: Some(message),
        }
    }
}

// ===== impl YangData =====

impl YangData {
    pub fn new(xpath: String, value: Option<String>) -> YangData {
        YangData {
            xpath,
            value: value.map(|value| YangDataValue {
                value: Some(yang_data_value::Value::EncodedStrVal(value)),
            }),
        }
    }
}
