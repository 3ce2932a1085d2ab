use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::configuration::{Configuration, Resource};
use crate::intrinsic::reference;

/// One CloudWatch alarm on a single metric.
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmSpec {
    pub metric_name: String,
    pub namespace: String,
    pub statistic: String,
    pub threshold: f64,
    pub comparison: String,
    pub evaluation_periods: u32,
    pub period_seconds: u32,
    pub description: Option<String>,
    pub alarm_actions: Vec<Value>,
    pub dimensions: Vec<(String, Value)>,
}

impl AlarmSpec {
    pub fn new(metric_name: impl Into<String>, namespace: impl Into<String>, threshold: f64) -> Self {
        Self {
            metric_name: metric_name.into(),
            namespace: namespace.into(),
            statistic: "Average".to_string(),
            threshold,
            comparison: "GreaterThanOrEqualToThreshold".to_string(),
            evaluation_periods: 5,
            period_seconds: 60,
            description: None,
            alarm_actions: Vec::new(),
            dimensions: Vec::new(),
        }
    }

    pub fn statistic(mut self, statistic: impl Into<String>) -> Self {
        self.statistic = statistic.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn action(mut self, action: Value) -> Self {
        self.alarm_actions.push(action);
        self
    }

    pub fn dimension(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.dimensions.push((name.into(), value.into()));
        self
    }

    fn properties(&self) -> Value {
        let dimensions: Vec<Value> = self
            .dimensions
            .iter()
            .map(|(name, value)| json!({ "Name": name, "Value": value }))
            .collect();
        let mut properties = json!({
            "ActionsEnabled": "true",
            "ComparisonOperator": self.comparison,
            "EvaluationPeriods": self.evaluation_periods.to_string(),
            "MetricName": self.metric_name,
            "Namespace": self.namespace,
            "Period": self.period_seconds.to_string(),
            "Statistic": self.statistic,
            "Threshold": format!("{:.1}", self.threshold),
            "AlarmActions": self.alarm_actions,
            "Dimensions": dimensions,
        });
        if let Some(description) = &self.description {
            properties["AlarmDescription"] = json!(description);
        }
        properties
    }
}

/// Notification topic endpoint, e.g. `("email", "ops@example.boss")`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Subscription {
    pub protocol: String,
    pub endpoint: String,
}

impl Subscription {
    pub fn new(protocol: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            endpoint: endpoint.into(),
        }
    }
}

const TOPIC_ACTIONS: &[&str] = &[
    "SNS:ListSubscriptionsByTopic",
    "SNS:Subscribe",
    "SNS:GetTopicAttributes",
    "SNS:Publish",
    "SNS:Receive",
];

impl Configuration {
    pub fn add_cloudwatch_alarm(&mut self, key: &str, spec: &AlarmSpec, depends_on: &[&str]) {
        self.add_resource(
            key,
            Resource::new("AWS::CloudWatch::Alarm", spec.properties())
                .depends_on(depends_on.iter().copied()),
        );
    }

    /// Latency, surge queue and unhealthy host alarms for load balancer
    /// `lb_name`, all notifying `alarm_action`.
    pub fn add_cloudwatch(&mut self, lb_name: &str, alarm_action: Value, depends_on: &[&str]) {
        let alarm = |metric: &str, threshold: f64| {
            AlarmSpec::new(metric, "AWS/ELB", threshold)
                .action(alarm_action.clone())
                .dimension("LoadBalancerName", lb_name)
        };

        self.add_cloudwatch_alarm("Latency", &alarm("Latency", 2.0), depends_on);
        self.add_cloudwatch_alarm(
            "SurgeCount",
            &alarm("SurgeQueueLength", 3.0).description("Surge Count in Load Balance"),
            depends_on,
        );
        self.add_cloudwatch_alarm(
            "UnhealthyHostCount",
            &alarm("UnHealthyHostCount", 1.0)
                .statistic("Minimum")
                .description("Unhealthy Host Count in Load Balance"),
            depends_on,
        );
    }

    /// SNS topic plus a `<key>Policy` letting account principals publish and
    /// subscribe to it.
    pub fn add_sns_topic(
        &mut self,
        key: &str,
        display_name: &str,
        subscriptions: &[Subscription],
        depends_on: &[&str],
    ) {
        self.add_resource(
            key,
            Resource::new(
                "AWS::SNS::Topic",
                json!({
                    "DisplayName": display_name,
                    "Subscription": subscriptions,
                }),
            )
            .depends_on(depends_on.iter().copied()),
        );

        self.add_resource(
            format!("{key}Policy"),
            Resource::new(
                "AWS::SNS::TopicPolicy",
                json!({
                    "Topics": [reference(key)],
                    "PolicyDocument": {
                        "Version": "2008-10-17",
                        "Statement": [{
                            "Effect": "Allow",
                            "Principal": { "AWS": "*" },
                            "Action": TOPIC_ACTIONS,
                            "Resource": reference(key),
                            "Condition": {
                                "StringEquals": { "AWS:SourceOwner": reference("AWS::AccountId") },
                            },
                        }],
                    },
                }),
            )
            .depends_on([key]),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::DEFAULT_REGION;
    use crate::lookup::HostTable;
    use crate::scenario::Scenario;

    fn config() -> Configuration {
        Configuration::new(
            "example.boss",
            DEFAULT_REGION,
            Scenario::default(),
            &HostTable::default(),
        )
        .unwrap()
    }

    #[test]
    fn load_balancer_alarm_set() {
        let mut config = config();
        config.add_sns_topic(
            "Alerts",
            "ops",
            &[Subscription::new("email", "ops@example.boss")],
            &[],
        );
        config.add_cloudwatch("web-example-boss", reference("Alerts"), &["Alerts"]);

        for key in ["Latency", "SurgeCount", "UnhealthyHostCount"] {
            let alarm = config.resource(key).unwrap();
            assert_eq!(alarm.kind, "AWS::CloudWatch::Alarm");
            assert_eq!(alarm.depends_on, vec!["Alerts"]);
            assert_eq!(alarm.property("AlarmActions").unwrap()[0], reference("Alerts"));
            assert_eq!(
                alarm.property("Dimensions").unwrap()[0]["Value"],
                "web-example-boss"
            );
        }
        let unhealthy = config.resource("UnhealthyHostCount").unwrap();
        assert_eq!(unhealthy.property("Statistic").unwrap(), "Minimum");
        assert_eq!(unhealthy.property("Threshold").unwrap(), "1.0");
        assert!(config.resource("Latency").unwrap().property("AlarmDescription").is_none());
        config.validate_references().unwrap();
    }

    #[test]
    fn topic_lists_subscriptions() {
        let mut config = config();
        config.add_sns_topic(
            "Alerts",
            "ops",
            &[
                Subscription::new("email", "ops@example.boss"),
                Subscription::new("sms", "15555550100"),
            ],
            &[],
        );
        let topic = config.resource("Alerts").unwrap();
        assert_eq!(topic.property("Subscription").unwrap()[1]["Protocol"], "sms");
        assert_eq!(
            config.resource("AlertsPolicy").unwrap().depends_on,
            vec!["Alerts"]
        );
    }
}
