mod event;

pub use event::{
    ClientAgent, DeviceClass, LocationData, NewRequestEvent, RequestEvent, UnknownDeviceClass,
    UNKNOWN_CLIENT, UNKNOWN_LOCATION,
};
