use super::*;

mod parse_network {
    use super::*;

    #[test]
    fn works() {
        let network = parse_network("10.0.0.0/24").unwrap();
        assert_eq!(Ipv4Addr::new(10, 0, 0, 0), network.network());
        assert_eq!(24, network.prefix());

        assert_eq!(32, parse_network(" 10.0.0.7 ").unwrap().prefix());
    }

    #[test]
    fn host_bits_set() {
        let error = parse_network("10.0.0.1/24").unwrap_err();
        assert!(matches!(error, ValidationError::HostBitsSet { .. }));
        assert!(error.to_string().contains("did you mean 10.0.0.0/24?"));
    }

    #[test]
    fn wide_networks() {
        assert_eq!(15, parse_network("10.0.0.0/15").unwrap().prefix());
        assert_eq!(0, parse_network("0.0.0.0/0").unwrap().prefix());
    }

    #[test]
    fn garbage() {
        for input in ["", "10.0.0.0/33", "ten.0.0.0/24", "::1/128"] {
            assert!(
                matches!(parse_network(input), Err(ValidationError::Network { .. })),
                "{input:?} was accepted",
            );
        }
    }
}

mod is_wide {
    use super::*;

    #[test]
    fn works() {
        assert!(!is_wide(parse_network("10.0.0.0/16").unwrap()));
        assert!(is_wide(parse_network("10.0.0.0/15").unwrap()));
        assert!(is_wide(parse_network("0.0.0.0/0").unwrap()));
    }
}

mod parse_address {
    use super::*;

    #[test]
    fn works() {
        assert_eq!(Ipv4Addr::new(10, 0, 0, 254), parse_address("10.0.0.254").unwrap());
        assert!(matches!(
            parse_address("10.0.0.256"),
            Err(ValidationError::Address { .. }),
        ));
    }
}

mod usable_hosts {
    use super::*;

    fn hosts(input: &str) -> Vec<Ipv4Addr> {
        usable_hosts(parse_network(input).unwrap())
    }

    #[test]
    fn excludes_network_and_broadcast() {
        let hosts = hosts("192.168.1.0/29");
        assert_eq!(
            (1..=6).map(|i| Ipv4Addr::new(192, 168, 1, i)).collect::<Vec<_>>(),
            hosts,
        );
    }

    #[test]
    fn slash_24() {
        let hosts = hosts("10.0.0.0/24");
        assert_eq!(254, hosts.len());
        assert_eq!(Some(&Ipv4Addr::new(10, 0, 0, 1)), hosts.first());
        assert_eq!(Some(&Ipv4Addr::new(10, 0, 0, 254)), hosts.last());
    }

    #[test]
    fn slash_30() {
        assert_eq!(
            vec![Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)],
            hosts("10.0.0.0/30"),
        );
    }

    #[test]
    fn point_to_point() {
        assert_eq!(
            vec![Ipv4Addr::new(10, 0, 0, 0), Ipv4Addr::new(10, 0, 0, 1)],
            hosts("10.0.0.0/31"),
        );
    }

    #[test]
    fn single_host() {
        assert_eq!(vec![Ipv4Addr::new(10, 0, 0, 9)], hosts("10.0.0.9/32"));
    }

    #[test]
    fn wider_than_slash_16() {
        let hosts = hosts("10.0.0.0/15");
        assert_eq!(131070, hosts.len());
        assert_eq!(Some(&Ipv4Addr::new(10, 0, 0, 1)), hosts.first());
        assert_eq!(Some(&Ipv4Addr::new(10, 1, 255, 254)), hosts.last());
    }

    #[test]
    fn top_of_address_space() {
        let hosts = hosts("255.255.255.0/30");
        assert_eq!(
            vec![Ipv4Addr::new(255, 255, 255, 1), Ipv4Addr::new(255, 255, 255, 2)],
            hosts,
        );
    }
}
