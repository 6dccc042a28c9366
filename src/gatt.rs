//! Heart Rate profile identifiers and the capability table a transport
//! reports after service discovery.

use std::time::Duration;

use uuid::Uuid;

pub const HEART_RATE_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000180d_0000_1000_8000_00805f9b34fb);
pub const HEART_RATE_MEASUREMENT_UUID: Uuid = Uuid::from_u128(0x00002a37_0000_1000_8000_00805f9b34fb);
pub const CLIENT_CHARACTERISTIC_CONFIG_UUID: Uuid = Uuid::from_u128(0x00002902_0000_1000_8000_00805f9b34fb);

pub const BATTERY_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000180f_0000_1000_8000_00805f9b34fb);
pub const BATTERY_LEVEL_UUID: Uuid = Uuid::from_u128(0x00002a19_0000_1000_8000_00805f9b34fb);

/// Value written to a CCCD to turn notifications on.
pub const ENABLE_NOTIFICATION_VALUE: [u8; 2] = [0x01, 0x00];

/// How long discovery events are collected before results are published.
pub const SCAN_WINDOW: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacteristicId {
    pub service: Uuid,
    pub characteristic: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorId {
    pub service: Uuid,
    pub characteristic: Uuid,
    pub descriptor: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicInfo {
    pub uuid: Uuid,
    pub notifiable: bool,
    pub descriptors: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub uuid: Uuid,
    pub characteristics: Vec<CharacteristicInfo>,
}

impl ServiceInfo {
    pub fn characteristic(&self, uuid: Uuid) -> Option<&CharacteristicInfo> {
        self.characteristics.iter().find(|c| c.uuid == uuid)
    }
}

/// Services, characteristics and descriptors exposed by a connected peripheral.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityTable {
    pub services: Vec<ServiceInfo>,
}

impl CapabilityTable {
    pub fn service(&self, uuid: Uuid) -> Option<&ServiceInfo> {
        self.services.iter().find(|s| s.uuid == uuid)
    }
}

/// The pieces of a table the session needs to subscribe to heart rate data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartRateSubscription {
    pub measurement: CharacteristicId,
    /// Missing when the peripheral did not expose a CCCD
    pub config_descriptor: Option<DescriptorId>,
}

/// Locate the Heart Rate Measurement characteristic and its configuration
/// descriptor. `None` when the table has no Heart Rate service, or the service
/// lacks a measurement characteristic that can notify.
pub fn find_heart_rate_subscription(table: &CapabilityTable) -> Option<HeartRateSubscription> {
    let service = table.service(HEART_RATE_SERVICE_UUID)?;
    let characteristic = service
        .characteristic(HEART_RATE_MEASUREMENT_UUID)
        .filter(|c| c.notifiable)?;

    let config_descriptor = characteristic
        .descriptors
        .iter()
        .find(|d| **d == CLIENT_CHARACTERISTIC_CONFIG_UUID)
        .map(|descriptor| DescriptorId {
            service: service.uuid,
            characteristic: characteristic.uuid,
            descriptor: *descriptor,
        });

    Some(HeartRateSubscription {
        measurement: CharacteristicId {
            service: service.uuid,
            characteristic: characteristic.uuid,
        },
        config_descriptor,
    })
}
