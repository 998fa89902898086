//! Scripted devices for exercising the pipeline without a network.

use super::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// The NTP server the scripted routers can reach.
pub const NTP_SERVER: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 254);

pub const SOFTWARE_PE: &str = "C3900-UNIVERSALK9-M";
pub const SOFTWARE_NPE: &str = "C3900-UNIVERSALK9_NPE-M";

/// Returns `show version` output for a CISCO3945 router.
pub fn show_version(hostname: &str, software: &str) -> String {
    format!(
        "Cisco IOS Software, C3900 Software ({software}), Version 15.4(3)M2, RELEASE SOFTWARE (fc2)\r
Technical Support: http://www.cisco.com/techsupport\r
Copyright (c) 1986-2015 by Cisco Systems, Inc.\r
Compiled Fri 06-Feb-15 17:01 by prod_rel_team\r
\r
ROM: System Bootstrap, Version 15.0(1r)M16, RELEASE SOFTWARE (fc1)\r
\r
{hostname} uptime is 1 week, 3 days, 2 hours, 7 minutes\r
System returned to ROM by power-on\r
System image file is \"flash0:c3900-universalk9-mz.SPA.154-3.M2.bin\"\r
\r
Cisco CISCO3945-CHASSIS (revision 1.1) with C3900-SPE150/K9 with 2027520K/69632K bytes of memory.\r
Processor board ID FGL1234567A\r
3 Gigabit Ethernet interfaces\r
Configuration register is 0x2102\r
"
    )
}

/// A running configuration with neither time setting.
pub const RUNNING_CONFIG: &str = "Building configuration...

Current configuration : 1142 bytes
!
version 15.4
service timestamps debug datetime msec
!
hostname R1
!
interface GigabitEthernet0/0
 ip address 10.0.0.1 255.255.255.0
 duplex auto
!
line vty 0 4
 transport input ssh
!
end
";

/// A running configuration that already carries both time settings for [NTP_SERVER].
pub const COMPLIANT_CONFIG: &str = "Building configuration...

Current configuration : 1201 bytes
!
version 15.4
!
hostname R1
!
clock timezone GMT 0 0
!
interface GigabitEthernet0/0
 ip address 10.0.0.1 255.255.255.0
!
ntp server 10.0.0.254
!
end
";

pub const CDP_TWO_NEIGHBORS: &str = "-------------------------
Device ID: SW1
Entry address(es):
  IP address: 10.0.0.2
Platform: cisco WS-C2960-24TT-L,  Capabilities: Switch IGMP
Interface: GigabitEthernet0/0,  Port ID (outgoing port): FastEthernet0/1
-------------------------
Device ID: R2
Entry address(es):
  IP address: 10.0.0.3
Platform: Cisco CISCO2911/K9,  Capabilities: Router Switch IGMP
Interface: GigabitEthernet0/1,  Port ID (outgoing port): GigabitEthernet0/0


Total cdp entries displayed : 2
";

pub const CDP_NOT_ENABLED: &str = "% CDP is not enabled\n";

pub const NTP_SYNCED: &str = "Clock is synchronized, stratum 3, reference is 10.0.0.254
nominal freq is 250.0000 Hz, actual freq is 250.0000 Hz, precision is 2**10
";

pub const NTP_UNSYNCED: &str = "Clock is unsynchronized, stratum 16, no reference clock
nominal freq is 250.0000 Hz, actual freq is 250.0000 Hz, precision is 2**10
";

pub const PING_OK: &str = "Type escape sequence to abort.
Sending 5, 100-byte ICMP Echos to 10.0.0.254, timeout is 2 seconds:
!!!!!
Success rate is 100 percent (5/5), round-trip min/avg/max = 1/2/4 ms
";

pub const PING_LOST: &str = "Type escape sequence to abort.
Sending 5, 100-byte ICMP Echos to 10.0.0.254, timeout is 2 seconds:
.....
Success rate is 0 percent (0/5)
";

pub const INVALID_INPUT: &str = "                 ^\n% Invalid input detected at '^' marker.\n";

/// What a fake device answers. Commands without a scripted answer produce no output.
#[derive(Clone, Debug)]
pub struct Script {
    responses: HashMap<String, Result<String, TransportError>>,
    configure: Result<String, TransportError>,
}

impl Default for Script {
    fn default() -> Self {
        Script {
            responses: HashMap::new(),
            configure: Ok(String::new()),
        }
    }
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// A healthy router named `hostname` that is missing both time settings.
    pub fn router(hostname: &str) -> Self {
        Script::new()
            .respond("show version", show_version(hostname, SOFTWARE_PE))
            .respond("show running-config", RUNNING_CONFIG)
            .respond("show cdp neighbors detail", CDP_TWO_NEIGHBORS)
            .respond("show ntp status", NTP_SYNCED)
            .respond(format!("ping {NTP_SERVER}"), PING_OK)
    }

    pub fn respond(mut self, command: impl Into<String>, output: impl Into<String>) -> Self {
        self.responses.insert(command.into(), Ok(output.into()));
        self
    }

    /// Makes `command` fail as if the session dropped.
    pub fn fail(mut self, command: impl Into<String>) -> Self {
        let command = command.into();
        let error = TransportError(format!("channel closed during `{command}`"));
        self.responses.insert(command, Err(error));
        self
    }

    pub fn configure_responds(mut self, output: impl Into<String>) -> Self {
        self.configure = Ok(output.into());
        self
    }

    pub fn fail_configure(mut self) -> Self {
        self.configure = Err(TransportError("channel closed during configure".to_owned()));
        self
    }
}

/// Everything a fake device was asked to do.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transcript {
    pub commands: Vec<String>,
    pub configured: Vec<Vec<String>>,
    pub closed: bool,
}

#[derive(Debug)]
pub struct FakeSession {
    script: Script,
    transcript: Arc<Mutex<Transcript>>,
}

impl FakeSession {
    /// A session that is not attached to any [FakeFleet].
    pub fn new(script: Script) -> Self {
        FakeSession {
            script,
            transcript: Arc::default(),
        }
    }

    pub fn transcript(&self) -> Transcript {
        self.transcript.lock().unwrap().clone()
    }
}

#[async_trait]
impl Session for FakeSession {
    async fn run(&mut self, command: &str) -> Result<String, TransportError> {
        self.transcript.lock().unwrap().commands.push(command.to_owned());
        self.script
            .responses
            .get(command)
            .cloned()
            .unwrap_or_else(|| Ok(String::new()))
    }

    async fn configure(&mut self, lines: &[String]) -> Result<String, TransportError> {
        self.transcript.lock().unwrap().configured.push(lines.to_vec());
        self.script.configure.clone()
    }

    async fn close(self) -> Result<(), TransportError> {
        self.transcript.lock().unwrap().closed = true;
        Ok(())
    }
}

/// A set of scripted devices. Connecting to an address without a script fails.
#[derive(Debug, Default)]
pub struct FakeFleet {
    scripts: HashMap<Ipv4Addr, Script>,
    transcripts: HashMap<Ipv4Addr, Arc<Mutex<Transcript>>>,
    logins: Vec<(Ipv4Addr, Credentials)>,
}

impl FakeFleet {
    pub fn new() -> Arc<Mutex<Self>> {
        Arc::default()
    }

    pub fn device(&mut self, address: Ipv4Addr, script: Script) {
        self.scripts.insert(address, script);
    }

    /// Returns what `address` was asked to do. Empty if it was never reached.
    pub fn transcript(&self, address: Ipv4Addr) -> Transcript {
        self.transcripts
            .get(&address)
            .map(|t| t.lock().unwrap().clone())
            .unwrap_or_default()
    }

    /// The address and credentials of every successful login, in order.
    pub fn logins(&self) -> &[(Ipv4Addr, Credentials)] {
        &self.logins
    }
}

#[async_trait]
impl ManageSession<FakeSession> for Arc<Mutex<FakeFleet>> {
    async fn connect(
        &mut self,
        address: Ipv4Addr,
        credentials: &Credentials,
    ) -> Result<FakeSession, ConnectError> {
        let mut fleet = self.lock().unwrap();
        let Some(script) = fleet.scripts.get(&address).cloned() else {
            return Err(ConnectError {
                host: address.to_string(),
                reason: "no route to host".to_owned(),
            });
        };

        fleet.logins.push((address, credentials.clone()));
        let transcript = fleet.transcripts.entry(address).or_default().clone();
        Ok(FakeSession { script, transcript })
    }
}
