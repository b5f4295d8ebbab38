//! Command class and command identifiers.
//!
//! Read-only lookup data. Each table exposes the numeric identifiers as
//! constants and a `name()` lookup for diagnostics.

/// Define a table of `u8` identifiers with a name lookup.
macro_rules! id_table {
    (
        $(#[$meta:meta])*
        pub mod $module:ident {
            $($konst:ident = $value:literal => $label:literal,)*
        }
    ) => {
        $(#[$meta])*
        pub mod $module {
            $(
                #[doc = concat!("`", $label, "` (", stringify!($value), ").")]
                pub const $konst: u8 = $value;
            )*

            /// Look up the name of an identifier in this table.
            pub fn name(value: u8) -> Option<&'static str> {
                match value {
                    $($value => Some($label),)*
                    _ => None,
                }
            }

            /// Check whether an identifier is part of this table.
            pub fn is_valid(value: u8) -> bool {
                name(value).is_some()
            }
        }
    };
}

id_table! {
    /// Z-Wave command classes.
    ///
    /// Legacy aliases sharing an identifier (`ALARM`, `MULTI_INSTANCE`,
    /// `MULTI_INSTANCE_ASSOCIATION`) live in [`command_class_aliases`].
    ///
    /// [`command_class_aliases`]: super::command_class_aliases
    pub mod command_class {
        ANTITHEFT = 0x5d => "Antitheft",
        APPLICATION_CAPABILITY = 0x57 => "ApplicationCapability",
        APPLICATION_STATUS = 0x22 => "ApplicationStatus",
        ASSOCIATION = 0x85 => "Association",
        ASSOCIATION_COMMAND_CONFIGURATION = 0x9b => "AssociationCommandConfiguration",
        ASSOCIATION_GRP_INFO = 0x59 => "AssociationGrpInfo",
        AV_CONTENT_DIRECTORY_MD = 0x95 => "AvContentDirectoryMd",
        AV_CONTENT_SEARCH_MD = 0x97 => "AvContentSearchMd",
        AV_RENDERER_STATUS = 0x96 => "AvRendererStatus",
        AV_TAGGING_MD = 0x99 => "AvTaggingMd",
        BARRIER_OPERATOR = 0x66 => "BarrierOperator",
        BASIC = 0x20 => "Basic",
        BASIC_TARIFF_INFO = 0x36 => "BasicTariffInfo",
        BASIC_WINDOW_COVERING = 0x50 => "BasicWindowCovering",
        BATTERY = 0x80 => "Battery",
        CENTRAL_SCENE = 0x5b => "CentralScene",
        CHIMNEY_FAN = 0x2a => "ChimneyFan",
        CLIMATE_CONTROL_SCHEDULE = 0x46 => "ClimateControlSchedule",
        CLOCK = 0x81 => "Clock",
        CONFIGURATION = 0x70 => "Configuration",
        CONTROLLER_REPLICATION = 0x21 => "ControllerReplication",
        CRC16_ENCAP = 0x56 => "Crc16Encap",
        DCP_CONFIG = 0x3a => "DcpConfig",
        DCP_MONITOR = 0x3b => "DcpMonitor",
        DEVICE_RESET_LOCALLY = 0x5a => "DeviceResetLocally",
        DMX = 0x65 => "Dmx",
        DOOR_LOCK = 0x62 => "DoorLock",
        DOOR_LOCK_LOGGING = 0x4c => "DoorLockLogging",
        ENERGY_PRODUCTION = 0x90 => "EnergyProduction",
        ENTRY_CONTROL = 0x6f => "EntryControl",
        FIRMWARE_UPDATE_MD = 0x7a => "FirmwareUpdateMd",
        GEOGRAPHIC_LOCATION = 0x8c => "GeographicLocation",
        GROUPING_NAME = 0x7b => "GroupingName",
        HAIL = 0x82 => "Hail",
        HRV_CONTROL = 0x39 => "HrvControl",
        HRV_STATUS = 0x37 => "HrvStatus",
        HUMIDITY_CONTROL_MODE = 0x6d => "HumidityControlMode",
        HUMIDITY_CONTROL_OPERATING_STATE = 0x6e => "HumidityControlOperatingState",
        HUMIDITY_CONTROL_SETPOINT = 0x64 => "HumidityControlSetpoint",
        INCLUSION_CONTROLLER = 0x74 => "InclusionController",
        INDICATOR = 0x87 => "Indicator",
        IP_ASSOCIATION = 0x5c => "IpAssociation",
        IP_CONFIGURATION = 0x9a => "IpConfiguration",
        IRRIGATION = 0x6b => "Irrigation",
        LANGUAGE = 0x89 => "Language",
        LOCK = 0x76 => "Lock",
        MAILBOX = 0x69 => "Mailbox",
        MANUFACTURER_PROPRIETARY = 0x91 => "ManufacturerProprietary",
        MANUFACTURER_SPECIFIC = 0x72 => "ManufacturerSpecific",
        MARK = 0xef => "Mark",
        METER = 0x32 => "Meter",
        METER_PULSE = 0x35 => "MeterPulse",
        METER_TBL_CONFIG = 0x3c => "MeterTblConfig",
        METER_TBL_MONITOR = 0x3d => "MeterTblMonitor",
        METER_TBL_PUSH = 0x3e => "MeterTblPush",
        MTP_WINDOW_COVERING = 0x51 => "MtpWindowCovering",
        MULTI_CHANNEL = 0x60 => "MultiChannel",
        MULTI_CHANNEL_ASSOCIATION = 0x8e => "MultiChannelAssociation",
        MULTI_CMD = 0x8f => "MultiCmd",
        NETWORK_MANAGEMENT_BASIC = 0x4d => "NetworkManagementBasic",
        NETWORK_MANAGEMENT_INCLUSION = 0x34 => "NetworkManagementInclusion",
        NETWORK_MANAGEMENT_INSTALLATION_MAINTENANCE = 0x67 => "NetworkManagementInstallationMaintenance",
        NETWORK_MANAGEMENT_PRIMARY = 0x54 => "NetworkManagementPrimary",
        NETWORK_MANAGEMENT_PROXY = 0x52 => "NetworkManagementProxy",
        NODE_NAMING = 0x77 => "NodeNaming",
        NON_INTEROPERABLE = 0xf0 => "NonInteroperable",
        NO_OPERATION = 0x00 => "NoOperation",
        NOTIFICATION = 0x71 => "Notification",
        POWERLEVEL = 0x73 => "Powerlevel",
        PREPAYMENT = 0x3f => "Prepayment",
        PREPAYMENT_ENCAPSULATION = 0x41 => "PrepaymentEncapsulation",
        PROPRIETARY = 0x88 => "Proprietary",
        PROTECTION = 0x75 => "Protection",
        RATE_TBL_CONFIG = 0x48 => "RateTblConfig",
        RATE_TBL_MONITOR = 0x49 => "RateTblMonitor",
        REMOTE_ASSOCIATION = 0x7d => "RemoteAssociation",
        REMOTE_ASSOCIATION_ACTIVATE = 0x7c => "RemoteAssociationActivate",
        SCENE_ACTIVATION = 0x2b => "SceneActivation",
        SCENE_ACTUATOR_CONF = 0x2c => "SceneActuatorConf",
        SCENE_CONTROLLER_CONF = 0x2d => "SceneControllerConf",
        SCHEDULE = 0x53 => "Schedule",
        SCHEDULE_ENTRY_LOCK = 0x4e => "ScheduleEntryLock",
        SCREEN_ATTRIBUTES = 0x93 => "ScreenAttributes",
        SCREEN_MD = 0x92 => "ScreenMd",
        SECURITY = 0x98 => "Security",
        SECURITY2 = 0x9f => "Security2",
        SECURITY_PANEL_MODE = 0x24 => "SecurityPanelMode",
        SECURITY_PANEL_ZONE = 0x2e => "SecurityPanelZone",
        SECURITY_PANEL_ZONE_SENSOR = 0x2f => "SecurityPanelZoneSensor",
        SENSOR_ALARM = 0x9c => "SensorAlarm",
        SENSOR_BINARY = 0x30 => "SensorBinary",
        SENSOR_CONFIGURATION = 0x9e => "SensorConfiguration",
        SENSOR_MULTILEVEL = 0x31 => "SensorMultilevel",
        SILENCE_ALARM = 0x9d => "SilenceAlarm",
        SIMPLE_AV_CONTROL = 0x94 => "SimpleAvControl",
        SUPERVISION = 0x6c => "Supervision",
        SWITCH_ALL = 0x27 => "SwitchAll",
        SWITCH_BINARY = 0x25 => "SwitchBinary",
        SWITCH_COLOR = 0x33 => "SwitchColor",
        SWITCH_MULTILEVEL = 0x26 => "SwitchMultilevel",
        SWITCH_TOGGLE_BINARY = 0x28 => "SwitchToggleBinary",
        SWITCH_TOGGLE_MULTILEVEL = 0x29 => "SwitchToggleMultilevel",
        TARIFF_CONFIG = 0x4a => "TariffConfig",
        TARIFF_TBL_MONITOR = 0x4b => "TariffTblMonitor",
        THERMOSTAT_FAN_MODE = 0x44 => "ThermostatFanMode",
        THERMOSTAT_FAN_STATE = 0x45 => "ThermostatFanState",
        THERMOSTAT_HEATING = 0x38 => "ThermostatHeating",
        THERMOSTAT_MODE = 0x40 => "ThermostatMode",
        THERMOSTAT_OPERATING_STATE = 0x42 => "ThermostatOperatingState",
        THERMOSTAT_SETBACK = 0x47 => "ThermostatSetback",
        THERMOSTAT_SETPOINT = 0x43 => "ThermostatSetpoint",
        TIME = 0x8a => "Time",
        TIME_PARAMETERS = 0x8b => "TimeParameters",
        TRANSPORT_SERVICE = 0x55 => "TransportService",
        USER_CODE = 0x63 => "UserCode",
        VERSION = 0x86 => "Version",
        WAKE_UP = 0x84 => "WakeUp",
        WINDOW_COVERING = 0x6a => "WindowCovering",
        ZENSOR_NET = 0x02 => "ZensorNet",
        ZIP = 0x23 => "Zip",
        ZIP6LOWPAN = 0x4f => "Zip6lowpan",
        ZIP_GATEWAY = 0x5f => "ZipGateway",
        ZIP_NAMING = 0x68 => "ZipNaming",
        ZIP_ND = 0x58 => "ZipNd",
        ZIP_PORTAL = 0x61 => "ZipPortal",
        ZWAVEPLUS_INFO = 0x5e => "ZwaveplusInfo",
    }
}

/// Older names for command classes that were renamed in later releases.
pub mod command_class_aliases {
    /// `Alarm`, renamed to `Notification`.
    pub const ALARM: u8 = super::command_class::NOTIFICATION;
    /// `MultiInstance`, renamed to `MultiChannel`.
    pub const MULTI_INSTANCE: u8 = super::command_class::MULTI_CHANNEL;
    /// `MultiInstanceAssociation`, renamed to `MultiChannelAssociation`.
    pub const MULTI_INSTANCE_ASSOCIATION: u8 = super::command_class::MULTI_CHANNEL_ASSOCIATION;
}

id_table! {
    /// Zip commands (version 3).
    pub mod zip {
        ZIP_PACKET = 0x02 => "ZipPacket",
    }
}

id_table! {
    /// ZipNd commands (version 1).
    pub mod zip_nd {
        NODE_ADVERTISEMENT = 0x01 => "ZipNodeAdvertisement",
        NODE_SOLICITATION = 0x03 => "ZipNodeSolicitation",
        INV_NODE_SOLICITATION = 0x04 => "ZipInvNodeSolicitation",
    }
}

id_table! {
    /// NetworkManagementProxy commands (version 2).
    pub mod network_management_proxy {
        NODE_LIST_GET = 0x01 => "NodeListGet",
        NODE_LIST_REPORT = 0x02 => "NodeListReport",
        NODE_INFO_CACHED_GET = 0x03 => "NodeInfoCachedGet",
        NODE_INFO_CACHED_REPORT = 0x04 => "NodeInfoCachedReport",
    }
}

id_table! {
    /// ZipGateway commands (version 1).
    pub mod zip_gateway {
        GATEWAY_MODE_SET = 0x01 => "GatewayModeSet",
        GATEWAY_MODE_GET = 0x02 => "GatewayModeGet",
        GATEWAY_MODE_REPORT = 0x03 => "GatewayModeReport",
        GATEWAY_PEER_SET = 0x04 => "GatewayPeerSet",
        GATEWAY_PEER_GET = 0x05 => "GatewayPeerGet",
        GATEWAY_PEER_REPORT = 0x06 => "GatewayPeerReport",
        GATEWAY_LOCK_SET = 0x07 => "GatewayLockSet",
        UNSOLICITED_DESTINATION_SET = 0x08 => "UnsolicitedDestinationSet",
        UNSOLICITED_DESTINATION_GET = 0x09 => "UnsolicitedDestinationGet",
        UNSOLICITED_DESTINATION_REPORT = 0x0a => "UnsolicitedDestinationReport",
        COMMAND_APPLICATION_NODE_INFO_SET = 0x0b => "CommandApplicationNodeInfoSet",
        COMMAND_APPLICATION_NODE_INFO_GET = 0x0c => "CommandApplicationNodeInfoGet",
        COMMAND_APPLICATION_NODE_INFO_REPORT = 0x0d => "CommandApplicationNodeInfoReport",
    }
}

id_table! {
    /// Basic commands (version 2).
    pub mod basic {
        SET = 0x01 => "Set",
        GET = 0x02 => "Get",
        REPORT = 0x03 => "Report",
    }
}

id_table! {
    /// SwitchBinary commands (version 2).
    pub mod switch_binary {
        SET = 0x01 => "Set",
        GET = 0x02 => "Get",
        REPORT = 0x03 => "Report",
    }
}

id_table! {
    /// SwitchMultilevel commands (version 4).
    pub mod switch_multilevel {
        SET = 0x01 => "Set",
        GET = 0x02 => "Get",
        REPORT = 0x03 => "Report",
        START_LEVEL_CHANGE = 0x04 => "StartLevelChange",
        STOP_LEVEL_CHANGE = 0x05 => "StopLevelChange",
        SUPPORTED_GET = 0x06 => "SupportedGet",
        SUPPORTED_REPORT = 0x07 => "SupportedReport",
    }
}

id_table! {
    /// SensorBinary commands (version 2).
    pub mod sensor_binary {
        SUPPORTED_GET_SENSOR = 0x01 => "SupportedGetSensor",
        GET = 0x02 => "Get",
        REPORT = 0x03 => "Report",
        SUPPORTED_SENSOR_REPORT = 0x04 => "SupportedSensorReport",
    }
}

id_table! {
    /// SensorMultilevel commands (version 10).
    pub mod sensor_multilevel {
        SUPPORTED_GET_SENSOR = 0x01 => "SupportedGetSensor",
        SUPPORTED_SENSOR_REPORT = 0x02 => "SupportedSensorReport",
        SUPPORTED_GET_SCALE = 0x03 => "SupportedGetScale",
        GET = 0x04 => "Get",
        REPORT = 0x05 => "Report",
        SUPPORTED_SCALE_REPORT = 0x06 => "SupportedScaleReport",
    }
}

id_table! {
    /// Battery commands (version 1).
    pub mod battery {
        GET = 0x02 => "Get",
        REPORT = 0x03 => "Report",
    }
}

id_table! {
    /// Version commands (version 2).
    pub mod version {
        GET = 0x11 => "Get",
        REPORT = 0x12 => "Report",
        COMMAND_CLASS_GET = 0x13 => "CommandClassGet",
        COMMAND_CLASS_REPORT = 0x14 => "CommandClassReport",
    }
}

id_table! {
    /// ManufacturerSpecific commands (version 2).
    pub mod manufacturer_specific {
        GET = 0x04 => "Get",
        REPORT = 0x05 => "Report",
        DEVICE_SPECIFIC_GET = 0x06 => "DeviceSpecificGet",
        DEVICE_SPECIFIC_REPORT = 0x07 => "DeviceSpecificReport",
    }
}

id_table! {
    /// WakeUp commands (version 2).
    pub mod wake_up {
        INTERVAL_SET = 0x04 => "IntervalSet",
        INTERVAL_GET = 0x05 => "IntervalGet",
        INTERVAL_REPORT = 0x06 => "IntervalReport",
        NOTIFICATION = 0x07 => "Notification",
        NO_MORE_INFORMATION = 0x08 => "NoMoreInformation",
        INTERVAL_CAPABILITIES_GET = 0x09 => "IntervalCapabilitiesGet",
        INTERVAL_CAPABILITIES_REPORT = 0x0a => "IntervalCapabilitiesReport",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_class_lookup() {
        assert_eq!(command_class::ZIP, 0x23);
        assert_eq!(command_class::ZIP_ND, 0x58);
        assert_eq!(command_class::NETWORK_MANAGEMENT_PROXY, 0x52);
        assert_eq!(command_class::name(0x25), Some("SwitchBinary"));
        assert_eq!(command_class::name(0x71), Some("Notification"));
        assert_eq!(command_class::name(0xff), None);
        assert!(!command_class::is_valid(0x01));
    }

    #[test]
    fn test_aliases_share_identifiers() {
        assert_eq!(command_class_aliases::ALARM, 0x71);
        assert_eq!(command_class_aliases::MULTI_INSTANCE, 0x60);
        assert_eq!(command_class_aliases::MULTI_INSTANCE_ASSOCIATION, 0x8e);
    }

    #[test]
    fn test_command_tables() {
        assert_eq!(zip::ZIP_PACKET, 0x02);
        assert_eq!(zip_nd::name(zip_nd::NODE_ADVERTISEMENT), Some("ZipNodeAdvertisement"));
        assert_eq!(network_management_proxy::NODE_LIST_REPORT, 0x02);
        assert!(version::is_valid(0x14));
        assert!(!battery::is_valid(0x01));
    }
}
