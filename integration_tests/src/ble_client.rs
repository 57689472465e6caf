//! BLE client standing in for the ColorControl app.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::time::timeout;
use uuid::Uuid;

use crate::protocol::{channel_value, parse_status, Channel};

/// ColorControl service and characteristic UUIDs
const SERVICE_UUID: Uuid = Uuid::from_u128(0x4fafc201_1fb5_459e_8fcc_c5c9c331914b);
const TANK_STATUS_UUID: Uuid = Uuid::from_u128(0x1dcef519_43ec_4267_8d4a_3b02ca61765d);
const RED_UUID: Uuid = Uuid::from_u128(0x8a7f1168_48af_4ef4_9bae_a8d15f08cefe);
const GREEN_UUID: Uuid = Uuid::from_u128(0x77b9c657_94d5_4f72_bfd4_53758dffa508);
const BLUE_UUID: Uuid = Uuid::from_u128(0x0dcef519_43ec_4267_8d4a_3b02ca61765d);

/// BLE client for the ColorControl bridge.
pub struct ColorControlClient {
    peripheral: Peripheral,
    red: Characteristic,
    green: Characteristic,
    blue: Characteristic,
    tank_status: Characteristic,
    /// Tank status notifications in arrival order
    notifications: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl ColorControlClient {
    /// Scan for a device by name and connect.
    pub async fn connect_by_name(name: &str, scan_timeout: Duration) -> Result<Self> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        let adapter = adapters
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No Bluetooth adapters found"))?;

        // The bridge only advertises its name, so scan unfiltered
        adapter.start_scan(ScanFilter::default()).await?;
        let peripheral = Self::find_device_by_name(&adapter, name, scan_timeout).await?;
        adapter.stop_scan().await?;

        peripheral.connect().await?;
        peripheral.discover_services().await?;

        if !peripheral.services().iter().any(|s| s.uuid == SERVICE_UUID) {
            return Err(anyhow!("ColorControl service not found on '{}'", name));
        }

        let characteristics = peripheral.characteristics();
        let find = |uuid: Uuid, label: &str| {
            characteristics
                .iter()
                .find(|c| c.uuid == uuid)
                .cloned()
                .ok_or_else(|| anyhow!("{} characteristic not found", label))
        };

        let red = find(RED_UUID, "Red")?;
        let green = find(GREEN_UUID, "Green")?;
        let blue = find(BLUE_UUID, "Blue")?;
        let tank_status = find(TANK_STATUS_UUID, "Tank status")?;

        peripheral.subscribe(&tank_status).await?;

        let notifications = Arc::new(Mutex::new(Vec::new()));

        let sink = notifications.clone();
        let peripheral_clone = peripheral.clone();
        tokio::spawn(async move {
            let mut stream = match peripheral_clone.notifications().await {
                Ok(s) => s,
                Err(_) => return,
            };

            while let Some(data) = stream.next().await {
                if data.uuid == TANK_STATUS_UUID {
                    sink.lock().await.push(data.value);
                }
            }
        });

        Ok(Self {
            peripheral,
            red,
            green,
            blue,
            tank_status,
            notifications,
        })
    }

    /// Find a device by name within the scan timeout.
    async fn find_device_by_name(
        adapter: &Adapter,
        name: &str,
        scan_timeout: Duration,
    ) -> Result<Peripheral> {
        let start = std::time::Instant::now();

        while start.elapsed() < scan_timeout {
            for peripheral in adapter.peripherals().await? {
                if let Some(props) = peripheral.properties().await? {
                    if props.local_name.as_deref() == Some(name) {
                        return Ok(peripheral);
                    }
                }
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        Err(anyhow!("Device '{}' not found within timeout", name))
    }

    /// Write a channel value the way the app does: decimal text, with response.
    pub async fn write_channel(&self, channel: Channel, value: i32) -> Result<()> {
        let characteristic = match channel {
            Channel::Red => &self.red,
            Channel::Green => &self.green,
            Channel::Blue => &self.blue,
        };

        self.peripheral
            .write(characteristic, &channel_value(value), WriteType::WithResponse)
            .await?;
        Ok(())
    }

    /// Write all three channels in red, green, blue order.
    pub async fn write_rgb(&self, rgb: [i32; 3]) -> Result<()> {
        self.write_channel(Channel::Red, rgb[0]).await?;
        self.write_channel(Channel::Green, rgb[1]).await?;
        self.write_channel(Channel::Blue, rgb[2]).await
    }

    /// Read the tank status characteristic directly.
    pub async fn read_status(&self) -> Result<Vec<u8>> {
        Ok(self.peripheral.read(&self.tank_status).await?)
    }

    /// Wait for the next tank status notification.
    pub async fn wait_for_status(&self, response_timeout: Duration) -> Result<[u8; 3]> {
        let result = timeout(response_timeout, async {
            loop {
                let mut queue = self.notifications.lock().await;
                if !queue.is_empty() {
                    let payload = queue.remove(0);
                    drop(queue);
                    return parse_status(&payload);
                }
                drop(queue);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;

        match result {
            Ok(status) => status,
            Err(_) => Err(anyhow!("Timeout waiting for tank status notification")),
        }
    }

    /// Fail if a notification arrives within `window`.
    pub async fn expect_no_status(&self, window: Duration) -> Result<()> {
        match self.wait_for_status(window).await {
            Ok(tanks) => Err(anyhow!("Expected no notification, got {:?}", tanks)),
            Err(_) => Ok(()),
        }
    }

    /// Clear any queued notifications.
    pub async fn clear_notifications(&self) {
        self.notifications.lock().await.clear();
    }

    /// Disconnect from the device.
    pub async fn disconnect(&self) -> Result<()> {
        self.peripheral.unsubscribe(&self.tank_status).await?;
        self.peripheral.disconnect().await?;
        Ok(())
    }
}
