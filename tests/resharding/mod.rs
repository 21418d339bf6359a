mod notification_case;
