//! Bluetooth devices seen by a Google Home device
//!
//! The device reports each nearby Bluetooth device with its raw
//! Class-of-Device and device-type bitfields. The decoding tables here turn
//! those into the human-readable strings shown on tracker entities.

use serde::{Deserialize, Serialize};

/// Raw Bluetooth device payload from the local API
#[derive(Debug, Clone, Deserialize)]
pub struct BtJson {
    pub mac_address: String,
    pub device_class: u32,
    pub device_type: u32,
    pub rssi: i32,
    pub expected_profiles: u32,
    #[serde(default)]
    pub name: Option<String>,
}

/// Local representation of a detected Bluetooth device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleHomeBtDevice {
    pub mac_address: String,
    pub device_class: u32,
    pub device_type: u32,
    pub rssi: i32,
    pub expected_profiles: u32,
    pub name: Option<String>,
}

impl From<BtJson> for GoogleHomeBtDevice {
    fn from(device: BtJson) -> Self {
        Self {
            mac_address: device.mac_address,
            device_class: device.device_class,
            device_type: device.device_type,
            rssi: device.rssi,
            expected_profiles: device.expected_profiles,
            name: device.name,
        }
    }
}

impl GoogleHomeBtDevice {
    /// Decode the transport bitmask into `BREDR`/`BLE` (or both, `|`-joined)
    pub fn decode_device_type(&self) -> String {
        let mut out = Vec::new();
        for (bit, name) in [(0, "BREDR"), (1, "BLE")] {
            if self.device_type & (1 << bit) != 0 {
                out.push(name);
            }
        }
        out.join("|")
    }

    /// Decode the Class-of-Device field into a readable description
    ///
    /// Renders `Major (minors)` followed by the major service classes, e.g.
    /// `Audio/Video (Headphoness): Audio, Rendering`.
    pub fn decode_device_class(&self) -> String {
        let major_number = (self.device_class >> 8) & 0x1f;
        let minor_number = (self.device_class >> 2) & 0x3f;

        let major = major_class(major_number);
        let minor = minor_class(major_number, minor_number);
        let services = major_service_classes(self.device_class);

        let mut output = major.to_string();
        if let Some(minor) = minor {
            output.push_str(&format!(" ({minor}s)"));
        }
        if !services.is_empty() {
            output.push_str(": ");
            output.push_str(&services.join(", "));
        }
        output
    }
}

/// Descriptor broadcast when a tracked Bluetooth device shows up
///
/// This is the payload carried on the add-device dispatcher signal and the
/// per-device record in the Bluetooth coordinator's data. Fields are copied
/// verbatim into the tracker entity created for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BtDeviceDescriptor {
    /// Identifier of the tracked device itself (derived from its MAC)
    pub device_id: String,
    /// Identifier of the Google Home device that saw it
    pub system_id: String,
    pub device_name: String,
    pub mac_address: Option<String>,
    /// Decoded Class-of-Device description
    pub device_class: String,
    /// Decoded transport types (`BREDR`, `BLE`)
    pub device_type: String,
    pub rssi: i32,
    pub expected_profiles: u32,
}

impl BtDeviceDescriptor {
    /// Build a descriptor for a Bluetooth device seen by the given system
    pub fn from_bt(system_id: &str, device: &GoogleHomeBtDevice) -> Self {
        Self {
            device_id: device_id_from_mac(&device.mac_address),
            system_id: system_id.to_string(),
            device_name: device
                .name
                .clone()
                .unwrap_or_else(|| device.mac_address.clone()),
            mac_address: Some(device.mac_address.clone()),
            device_class: device.decode_device_class(),
            device_type: device.decode_device_type(),
            rssi: device.rssi,
            expected_profiles: device.expected_profiles,
        }
    }
}

/// Derive a stable tracked-device id from a MAC address
pub fn device_id_from_mac(mac: &str) -> String {
    mac.to_lowercase().replace(':', "")
}

fn major_class(major_number: u32) -> &'static str {
    const CLASSES: [&str; 10] = [
        "Miscellaneous",
        "Computer",
        "Phone",
        "LAN/Network Access Point",
        "Audio/Video",
        "Peripheral",
        "Imaging",
        "Wearable",
        "Toy",
        "Health",
    ];
    match major_number {
        n if (n as usize) < CLASSES.len() => CLASSES[n as usize],
        31 => "Uncategorized",
        _ => "Reserved",
    }
}

fn minor_class(major_number: u32, minor_number: u32) -> Option<String> {
    match major_number {
        1 => Some(pick(minor_number, &COMPUTER_CLASSES)),
        2 => Some(pick(minor_number, &PHONE_CLASSES)),
        3 => Some(pick(minor_number, &AP_CLASSES)),
        4 => Some(pick(minor_number, &AV_CLASSES)),
        5 => Some(peripheral_class(minor_number)),
        6 => Some(imaging_class(minor_number)),
        7 => Some(pick(minor_number, &WEARABLE_CLASSES)),
        8 => Some(pick(minor_number, &TOY_CLASSES)),
        9 => Some(pick(minor_number, &HEALTH_CLASSES)),
        _ => None,
    }
}

/// Index into a minor-class table, falling back to `reserved`
fn pick(minor_number: u32, classes: &[&str]) -> String {
    classes
        .get(minor_number as usize)
        .copied()
        .unwrap_or("reserved")
        .to_string()
}

const COMPUTER_CLASSES: [&str; 8] = [
    "Uncategorized",
    "Desktop workstation",
    "Server-class computer",
    "Laptop",
    "Handheld PC/PDA (clamshell)",
    "Palm-size PC/PDA",
    "Wearable computer (watch size)",
    "Tablet",
];

const PHONE_CLASSES: [&str; 6] = [
    "Uncategorized",
    "Cellular",
    "Cordless",
    "Smartphone",
    "Wired modem or voice gateway",
    "Common ISDN access",
];

const AP_CLASSES: [&str; 8] = [
    "Fully available",
    "1% to 17% utilized",
    "17% to 33% utilized",
    "33% to 50% utilized",
    "50% to 67% utilized",
    "67% to 83% utilized",
    "83% to 99% utilized",
    "No service available",
];

const AV_CLASSES: [&str; 19] = [
    "Uncategorized",
    "Wearable Headset Device",
    "Hands-free Device",
    "(Reserved)",
    "Microphone",
    "Loudspeaker",
    "Headphones",
    "Portable Audio",
    "Car audio",
    "Set-top box",
    "HiFi Audio Device",
    "VCR",
    "Video Camera",
    "Camcorder",
    "Video Monitor",
    "Video Display and Loudspeaker",
    "Video Conferencing",
    "(Reserved)",
    "Gaming/Toy",
];

const WEARABLE_CLASSES: [&str; 5] = ["Wristwatch", "Pager", "Jacket", "Helmet", "Glasses"];

const TOY_CLASSES: [&str; 5] = [
    "Robot",
    "Vehicle",
    "Doll / Action figure",
    "Controller",
    "Game",
];

const HEALTH_CLASSES: [&str; 16] = [
    "Undefined",
    "Blood Pressure Monitor",
    "Thermometer",
    "Weighing Scale",
    "Glucose Meter",
    "Pulse Oximeter",
    "Heart/Pulse Rate Monitor",
    "Health Data Display",
    "Step Counter",
    "Body Composition Analyzer",
    "Peak Flow Monitor",
    "Medication Monitor",
    "Knee Prosthesis",
    "Ankle Prosthesis",
    "Generic Health Manager",
    "Personal Mobility Device",
];

/// Peripherals encode a pointing/keyboard "feel" in the top two bits
fn peripheral_class(minor_number: u32) -> String {
    const FEELS: [&str; 4] = [
        "Not Keyboard / Not Pointing Device",
        "Keyboard",
        "Pointing device",
        "Combo keyboard/pointing device",
    ];
    const DEVICES: [&str; 10] = [
        "Uncategorized",
        "Joystick",
        "Gamepad",
        "Remote control",
        "Sensing device",
        "Digitizer tablet",
        "Card Reader",
        "Digital Pen",
        "Handheld scanner for bar-codes, RFID, etc.",
        "Handheld gestural input device",
    ];
    let feel = FEELS[((minor_number >> 4) & 0x3) as usize];
    let device = DEVICES
        .get((minor_number & 0xf) as usize)
        .copied()
        .unwrap_or("reserved");
    format!("{feel}, {device}")
}

/// Imaging minors are a bitfield rather than an index
fn imaging_class(minor_number: u32) -> String {
    let mut minors = Vec::new();
    for (bit, name) in [(2, "Display"), (3, "Camera"), (4, "Scanner"), (5, "Printer")] {
        if minor_number & (1 << bit) != 0 {
            minors.push(name);
        }
    }
    minors.join(", ")
}

fn major_service_classes(device_class: u32) -> Vec<&'static str> {
    const SERVICES: [(u32, &str); 11] = [
        (23, "Information"),
        (22, "Telephony"),
        (21, "Audio"),
        (20, "Object Transfer"),
        (19, "Capturing"),
        (18, "Rendering"),
        (17, "Networking"),
        (16, "Positioning"),
        (15, "(reserved)"),
        (14, "(reserved)"),
        (13, "Limited Discoverable Mode"),
    ];
    SERVICES
        .iter()
        .filter(|(bit, _)| device_class & (1 << bit) != 0)
        .map(|(_, name)| *name)
        .collect()
}
