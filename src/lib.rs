pub mod error;

pub mod base {
    pub mod address;
}

pub mod defs {
    pub mod common;
    pub mod gear {
        pub mod cmd;
        pub mod status;
    }
    pub mod device {
        pub mod cmd;
    }
}

pub mod phy {
    pub mod hal;
    pub mod loopback;
    pub mod machine;
    pub mod timing;
    pub mod transceiver;
}

pub mod drivers {
    pub mod driver;
    pub mod driver_utils;
    pub mod manchester;
    pub mod send_flags;
    pub mod simulator {
        pub mod config;
        pub mod device;
        pub mod gear;
        pub mod input;
        pub mod simulator;
        #[cfg(test)]
        mod test;
    }
}

pub mod common {
    pub mod commands;
}

pub mod gear {
    pub mod commands;
}

pub mod device {
    pub mod commands;
    pub mod events;
    pub mod sensors;
}

pub mod utils {
    pub mod address_assignment;
    pub mod dyn_future;
    pub mod long_address;
}
