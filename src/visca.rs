use anyhow::{Context, Result};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use crate::motion::{Direction, MotionSink};

/// VISCA over IP のデフォルトポート
pub const VISCA_DEFAULT_PORT: u16 = 52381;

const PAYLOAD_TYPE_COMMAND: u16 = 0x0100;
const PAYLOAD_TYPE_CONTROL: u16 = 0x0200;
const HEADER_LEN: usize = 8;

/// カメラアドレス1宛て
const ADDRESS: u8 = 0x81;
const TERMINATOR: u8 = 0xFF;

pub const PAN_SPEED_MAX: u8 = 0x18;
pub const TILT_SPEED_MAX: u8 = 0x17;
pub const ZOOM_SPEED_MAX: u8 = 0x07;

/// 方向と速度から VISCA コマンド本体を構築
///
/// パン・チルト: 81 01 06 01 VV WW XX YY FF
/// ズーム:       81 01 04 07 {00 | 2p | 3p} FF
pub fn build_command(direction: Direction, speed: u8) -> Vec<u8> {
    let pan_speed = speed.clamp(1, PAN_SPEED_MAX);
    let tilt_speed = speed.clamp(1, TILT_SPEED_MAX);
    let zoom_speed = speed.min(ZOOM_SPEED_MAX);

    // ズームはパン・チルトとは別のコマンド系統
    if direction.is_zoom() {
        let arg = match direction {
            Direction::ZoomIn => 0x20 | zoom_speed,
            Direction::ZoomOut => 0x30 | zoom_speed,
            _ => 0x00,
        };
        return vec![ADDRESS, 0x01, 0x04, 0x07, arg, TERMINATOR];
    }

    let (pan, tilt) = match direction {
        Direction::PanLeft => (0x01, 0x03),
        Direction::PanRight => (0x02, 0x03),
        Direction::TiltUp => (0x03, 0x01),
        Direction::TiltDown => (0x03, 0x02),
        _ => (0x03, 0x03),
    };
    vec![ADDRESS, 0x01, 0x06, 0x01, pan_speed, tilt_speed, pan, tilt, TERMINATOR]
}

/// ヘッダ (payload type, payload length, sequence number) を付けてパケット化
pub fn encode_packet(payload_type: u16, sequence: u32, payload: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(HEADER_LEN + payload.len());
    packet.extend_from_slice(&payload_type.to_be_bytes());
    packet.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    packet.extend_from_slice(&sequence.to_be_bytes());
    packet.extend_from_slice(payload);
    packet
}

/// VISCA over IP クライアント
///
/// 応答は待たない（投げっぱなし）。送信は書き込みタイムアウトで上限を設ける。
pub struct ViscaClient {
    socket: UdpSocket,
    target: SocketAddr,
    sequence: u32,
    direction: Direction,
    speed: u8,
}

impl ViscaClient {
    pub fn new(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let target = (host, port)
            .to_socket_addrs()
            .with_context(|| format!("Failed to resolve camera address {}:{}", host, port))?
            .next()
            .with_context(|| format!("No address for camera {}:{}", host, port))?;

        let bind_addr = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr)?;
        socket.set_write_timeout(Some(timeout))?;
        socket
            .connect(target)
            .with_context(|| format!("Failed to connect UDP socket to {}", target))?;

        Ok(Self {
            socket,
            target,
            sequence: 0,
            direction: Direction::Stop,
            speed: 1,
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// カメラ側のシーケンス番号をリセット
    pub fn reset_sequence(&mut self) -> Result<()> {
        self.sequence = 0;
        self.send(PAYLOAD_TYPE_CONTROL, &[0x01])?;
        Ok(())
    }

    fn send(&mut self, payload_type: u16, payload: &[u8]) -> Result<()> {
        let packet = encode_packet(payload_type, self.sequence, payload);
        self.sequence = self.sequence.wrapping_add(1);
        self.socket
            .send(&packet)
            .with_context(|| format!("Failed to send VISCA packet to {}", self.target))?;
        Ok(())
    }
}

impl MotionSink for ViscaClient {
    fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    fn set_speed(&mut self, speed: u8) {
        self.speed = speed;
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn speed(&self) -> u8 {
        self.speed
    }

    fn commit(&mut self) -> Result<()> {
        let payload = build_command(self.direction, self.speed);
        self.send(PAYLOAD_TYPE_COMMAND, &payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_command_pan_left() {
        let cmd = build_command(Direction::PanLeft, 5);
        assert_eq!(cmd, vec![0x81, 0x01, 0x06, 0x01, 0x05, 0x05, 0x01, 0x03, 0xFF]);
    }

    #[test]
    fn test_build_command_tilt_down() {
        let cmd = build_command(Direction::TiltDown, 3);
        assert_eq!(&cmd[6..8], &[0x03, 0x02]);
    }

    #[test]
    fn test_build_command_stop() {
        let cmd = build_command(Direction::Stop, 1);
        assert_eq!(cmd, vec![0x81, 0x01, 0x06, 0x01, 0x01, 0x01, 0x03, 0x03, 0xFF]);
    }

    #[test]
    fn test_build_command_speed_limits() {
        // パンは0x18、チルトは0x17が上限
        let cmd = build_command(Direction::PanRight, 30);
        assert_eq!(cmd[4], PAN_SPEED_MAX);
        assert_eq!(cmd[5], TILT_SPEED_MAX);

        let cmd = build_command(Direction::PanRight, 0);
        assert_eq!(cmd[4], 0x01);
    }

    #[test]
    fn test_build_command_zoom() {
        assert_eq!(build_command(Direction::ZoomIn, 3), vec![0x81, 0x01, 0x04, 0x07, 0x23, 0xFF]);
        assert_eq!(build_command(Direction::ZoomOut, 12), vec![0x81, 0x01, 0x04, 0x07, 0x37, 0xFF]);
        assert_eq!(build_command(Direction::ZoomStop, 12), vec![0x81, 0x01, 0x04, 0x07, 0x00, 0xFF]);
    }

    #[test]
    fn test_zoom_directions_use_zoom_command() {
        let all = [
            Direction::Stop,
            Direction::PanLeft,
            Direction::PanRight,
            Direction::TiltUp,
            Direction::TiltDown,
            Direction::ZoomIn,
            Direction::ZoomOut,
            Direction::ZoomStop,
        ];
        for direction in all {
            let cmd = build_command(direction, 5);
            if direction.is_zoom() {
                assert_eq!(&cmd[..4], &[0x81, 0x01, 0x04, 0x07], "{}", direction);
            } else {
                assert_eq!(&cmd[..4], &[0x81, 0x01, 0x06, 0x01], "{}", direction);
            }
        }
    }

    #[test]
    fn test_encode_packet_header() {
        let payload = build_command(Direction::ZoomStop, 1);
        let packet = encode_packet(PAYLOAD_TYPE_COMMAND, 0x0102_0304, &payload);
        assert_eq!(&packet[..8], &[0x01, 0x00, 0x00, 0x06, 0x01, 0x02, 0x03, 0x04]);
        assert_eq!(&packet[8..], payload.as_slice());
    }

    #[test]
    fn test_client_sends_over_udp() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(1)))
            .unwrap();
        let port = receiver.local_addr().unwrap().port();

        let mut client = ViscaClient::new("127.0.0.1", port, Duration::from_millis(100)).unwrap();
        client.reset_sequence().unwrap();
        client.set_direction(Direction::PanRight);
        client.set_speed(8);
        client.commit().unwrap();

        let mut buf = [0u8; 64];
        let n = receiver.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[0x02, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0x01]);

        let n = receiver.recv(&mut buf).unwrap();
        let expected = encode_packet(
            PAYLOAD_TYPE_COMMAND,
            1,
            &build_command(Direction::PanRight, 8),
        );
        assert_eq!(&buf[..n], expected.as_slice());
    }
}
